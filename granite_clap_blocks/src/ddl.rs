//! CLI config for DDL coordination.

use std::time::Duration;

use granite_coordinator::CoordinatorConfig;

/// Config block for the DDL coordination layer.
///
/// Converted into a [`CoordinatorConfig`] once at startup; the running
/// coordinator and registry never re-read these values.
#[derive(Debug, clap::Parser, Clone, Copy)]
pub struct DdlCoordinationConfig {
    /// How long a coordinator run waits for per-node replies before
    /// recording the remainder as timed out.
    ///
    /// Applies independently to the dispatch and compensation reply
    /// windows of a single request.
    #[clap(
        long = "ddl-collection-timeout",
        env = "GRANITE_DDL_COLLECTION_TIMEOUT",
        default_value = "10s",
        value_parser = humantime::parse_duration,
        action
    )]
    pub collection_timeout: Duration,

    /// The maximum number of cluster nodes concurrently registered to
    /// receive DDL coordination traffic.
    #[clap(
        long = "ddl-participant-capacity",
        env = "GRANITE_DDL_PARTICIPANT_CAPACITY",
        default_value = "1024",
        action
    )]
    pub participant_capacity: usize,
}

impl DdlCoordinationConfig {
    /// Build the [`CoordinatorConfig`] consumed at coordinator and
    /// registry construction.
    pub fn build(self) -> CoordinatorConfig {
        CoordinatorConfig {
            collection_timeout: self.collection_timeout,
            participant_capacity: self.participant_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::Parser;
    use std::ffi::OsString;

    #[test]
    fn test_defaults() {
        let config = DdlCoordinationConfig::parse_from(std::iter::empty::<OsString>()).build();

        assert_eq!(config.collection_timeout, Duration::from_secs(10));
        assert_eq!(config.participant_capacity, 1024);
    }

    #[test]
    fn test_overrides() {
        let config = DdlCoordinationConfig::parse_from([
            "prog",
            "--ddl-collection-timeout",
            "250ms",
            "--ddl-participant-capacity",
            "16",
        ])
        .build();

        assert_eq!(config.collection_timeout, Duration::from_millis(250));
        assert_eq!(config.participant_capacity, 16);
    }
}
