use std::env;
use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;

use crate::catalog::Catalog;
use crate::rules::RuleLimits;
use crate::search::GenerationConfig;
use crate::types::Vec3;

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub generation: GenerationSettings,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            generation: GenerationSettings::from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_PORT: u16 = 8080;
    const HOST_VAR: &'static str = "HOUSING_API_HOST";
    const PORT_VAR: &'static str = "HOUSING_API_PORT";

    fn from_env() -> Self {
        let host_value =
            env_string(Self::HOST_VAR).unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, display_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                tracing::warn!(
                    "Could not parse {} ('{}'): {}. Using {}.",
                    Self::HOST_VAR,
                    host_value,
                    err,
                    Self::DEFAULT_HOST
                );
                (
                    IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                    Self::DEFAULT_HOST.to_string(),
                )
            }
        };

        let port = load_with_warning(
            Self::PORT_VAR,
            Self::DEFAULT_PORT,
            |value| value != 0,
            "must not be 0",
        );

        Self {
            bind_ip,
            display_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }
}

/// Search budgets, catalog overrides and rule limits.
#[derive(Clone, Debug)]
pub struct GenerationSettings {
    generation: GenerationConfig,
}

impl GenerationSettings {
    const MAX_ATTEMPTS_VAR: &'static str = "HOUSING_MAX_OVERALL_ATTEMPTS";
    const BLOCK_RETRIES_VAR: &'static str = "HOUSING_MAX_BLOCK_RETRIES";
    const GRID_MAX_VAR: &'static str = "HOUSING_GRID_MAX";
    const MODULE_X_VAR: &'static str = "HOUSING_MODULE_SIZE_X";
    const MODULE_Y_VAR: &'static str = "HOUSING_MODULE_SIZE_Y";
    const MODULE_Z_VAR: &'static str = "HOUSING_MODULE_SIZE_Z";
    const MIN_GROUND_COMFORT_VAR: &'static str = "HOUSING_MIN_GROUND_COMFORT";
    const MAX_STACKED_LEVELS_VAR: &'static str = "HOUSING_MAX_STACKED_LEVELS";
    const MAX_GROUND_RUN_VAR: &'static str = "HOUSING_MAX_GROUND_RUN";

    fn from_env() -> Self {
        let max_overall_attempts = load_with_warning(
            Self::MAX_ATTEMPTS_VAR,
            GenerationConfig::DEFAULT_MAX_OVERALL_ATTEMPTS,
            |value| value > 0,
            "must be greater than 0",
        );

        let max_block_retries = load_with_warning(
            Self::BLOCK_RETRIES_VAR,
            GenerationConfig::DEFAULT_MAX_BLOCK_RETRIES,
            |value| value > 0,
            "must be greater than 0",
        );

        let default_module = Catalog::DEFAULT_MODULE_SIZE;
        let module_axis = |var_name: &str, default: f64| {
            load_with_warning(
                var_name,
                default,
                |value: f64| value > 0.0 && value.is_finite(),
                "must be greater than 0",
            )
        };
        let module_size = Vec3::new(
            module_axis(Self::MODULE_X_VAR, default_module.x),
            module_axis(Self::MODULE_Y_VAR, default_module.y),
            module_axis(Self::MODULE_Z_VAR, default_module.z),
        );
        let grid_max = load_with_warning(
            Self::GRID_MAX_VAR,
            Catalog::DEFAULT_GRID_MAX,
            |value| value >= 1,
            "must be at least 1",
        );
        let catalog = build_catalog(grid_max, module_size);

        let limits = RuleLimits {
            min_ground_comfort: load_with_warning(
                Self::MIN_GROUND_COMFORT_VAR,
                RuleLimits::DEFAULT_MIN_GROUND_COMFORT,
                |_| true,
                "",
            ),
            max_stacked_levels: load_with_warning(
                Self::MAX_STACKED_LEVELS_VAR,
                RuleLimits::DEFAULT_MAX_STACKED_LEVELS,
                |value| value >= 1,
                "must be at least 1",
            ),
            max_ground_run: load_with_warning(
                Self::MAX_GROUND_RUN_VAR,
                RuleLimits::DEFAULT_MAX_GROUND_RUN,
                |value| value >= 1,
                "must be at least 1",
            ),
        };

        let generation = GenerationConfig::builder()
            .catalog(catalog)
            .max_overall_attempts(max_overall_attempts)
            .max_block_retries(max_block_retries)
            .limits(limits)
            .build();

        Self { generation }
    }

    /// Returns the configured search parameters.
    pub fn generation_config(&self) -> &GenerationConfig {
        &self.generation
    }
}

/// Applies catalog overrides; an override the catalog rejects falls back to the default.
fn build_catalog(grid_max: i32, module_size: Vec3) -> Catalog {
    let base = Catalog::default();
    let with_grid = base.with_grid_max(grid_max).unwrap_or_else(|err| {
        tracing::warn!("Ignoring grid override: {}. Using {}.", err, Catalog::DEFAULT_GRID_MAX);
        base.clone()
    });
    with_grid.with_module_size(module_size).unwrap_or_else(|err| {
        tracing::warn!("Ignoring module size override: {}.", err);
        with_grid.clone()
    })
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            tracing::warn!("Access to {} failed: {}. Using default value.", name, err);
            None
        }
    }
}

fn parse_value<T>(
    var_name: &str,
    raw: &str,
    default: T,
    validator: impl Fn(T) -> bool,
    invalid_hint: &str,
) -> T
where
    T: FromStr + Display + Copy + PartialEq,
    T::Err: Display,
{
    match raw.parse::<T>() {
        Ok(value) if validator(value) => {
            if value != default {
                tracing::info!("{} overridden ({} instead of {}).", var_name, value, default);
            }
            value
        }
        Ok(_) => {
            tracing::warn!(
                "{} contains invalid value '{}': {}. Using {}.",
                var_name,
                raw,
                invalid_hint,
                default
            );
            default
        }
        Err(err) => {
            tracing::warn!(
                "Could not parse {} ('{}'): {}. Using {}.",
                var_name,
                raw,
                err,
                default
            );
            default
        }
    }
}

fn load_with_warning<T>(
    var_name: &str,
    default: T,
    validator: impl Fn(T) -> bool,
    invalid_hint: &str,
) -> T
where
    T: FromStr + Display + Copy + PartialEq,
    T::Err: Display,
{
    match env_string(var_name) {
        Some(raw) => parse_value(var_name, &raw, default, validator, invalid_hint),
        None => default,
    }
}
