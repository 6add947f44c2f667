//! Configuration: defaults, validation, loading from the environment.

pub mod app_config;
pub mod defaults;
pub mod validation;

pub use app_config::AppConfig;

/// Print every setting with its effective value.
pub fn print_settings() {
    for def in defaults::all() {
        let value = std::env::var(def.key).unwrap_or_else(|_| def.default.to_string());
        let shown = if value.is_empty() { "-" } else { value.as_str() };
        let status = match validation::validate_setting(def.key, &value) {
            Ok(()) => String::new(),
            Err(e) => format!("  [invalid: {e}]"),
        };
        println!("{:<22} {shown:<12} {}{status}", def.key, def.description);
    }
}
