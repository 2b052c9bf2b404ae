use crond::config::DaemonConfig;
use crond::daemon::Daemon;
use crond::logging;

fn main() {
    let config = DaemonConfig::default();
    logging::init(&config.syslog_ident);

    let mut daemon = Daemon::bootstrap(config);
    daemon.run();
}
