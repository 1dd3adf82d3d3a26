use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Returns the value of the named environment variable if it exists or panics.
pub fn get_variable(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| panic!("must define {} environment variable", name))
}

/// Parses the named environment variable, panicking if it’s missing or
/// malformed.
pub fn parse_variable<T: FromStr>(name: &str) -> T {
    get_variable(name)
        .parse()
        .unwrap_or_else(|_| panic!("parse {} environment variable", name))
}

/// Parses the named environment variable if it’s set, otherwise
/// returns `default`. A value that’s set but malformed still panics.
pub fn parse_variable_or<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(_) => parse_variable(name),
        Err(_) => default,
    }
}

/// Settings for the database pool.
#[derive(Clone, Debug)]
pub struct DatabaseSettings {
    pub connection_string: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl DatabaseSettings {
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
    pub const DEFAULT_ACQUIRE_TIMEOUT_SECONDS: u64 = 30;

    pub fn from_env() -> Self {
        DatabaseSettings {
            connection_string: get_variable("INSPECTIONS_DB_CONNECTION_STRING"),
            max_connections: parse_variable_or(
                "INSPECTIONS_DB_MAX_CONNECTIONS",
                Self::DEFAULT_MAX_CONNECTIONS,
            ),
            acquire_timeout: Duration::from_secs(parse_variable_or(
                "INSPECTIONS_DB_ACQUIRE_TIMEOUT_SECONDS",
                Self::DEFAULT_ACQUIRE_TIMEOUT_SECONDS,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_unset_variables() {
        assert_eq!(
            parse_variable_or::<u32>("INSPECTIONS_TEST_SURELY_UNSET_VARIABLE", 17),
            17
        );
    }

    #[test]
    #[should_panic(expected = "parse INSPECTIONS_TEST_MALFORMED_VARIABLE")]
    fn malformed_variables_panic() {
        env::set_var("INSPECTIONS_TEST_MALFORMED_VARIABLE", "ten");

        let _: u32 = parse_variable_or("INSPECTIONS_TEST_MALFORMED_VARIABLE", 10);
    }
}
