use crate::config::model::{Config, MapConfig, SupabaseConfig};
use crate::geolocation::recenter::RecenterBehavior;
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_APP_ORIGIN: &str = "http://localhost:5173";

pub fn load_config() -> Config {
    let defaults = MapConfig::default();

    let supabase = SupabaseConfig {
        url: load_required_config("SUPABASE_URL"),
        anon_key: load_required_config("SUPABASE_ANON_KEY"),
        max_retries: load_parsed_config("SUPABASE_MAX_RETRIES", 0, "a non-negative integer"),
    };

    let debounce_ms = load_parsed_config(
        "MAP_DEBOUNCE_MS",
        defaults.debounce.as_millis() as u64,
        "a number of milliseconds",
    );

    let map = MapConfig {
        cluster_radius: load_parsed_config(
            "CLUSTER_RADIUS",
            defaults.cluster_radius,
            "a radius in pixels",
        ),
        cluster_max_zoom: load_parsed_config(
            "CLUSTER_MAX_ZOOM",
            defaults.cluster_max_zoom,
            "a zoom level between 0 and 30",
        ),
        debounce: Duration::from_millis(debounce_ms),
        recenter_behavior: load_parsed_config(
            "RECENTER_BEHAVIOR",
            RecenterBehavior::default(),
            "either 'once' or 'follow'",
        ),
    };

    if map.cluster_max_zoom > 30 {
        panic!("Invalid config 'CLUSTER_MAX_ZOOM'. Expected a zoom level between 0 and 30");
    }

    Config {
        supabase,
        map,
        app_origin: env::var("APP_ORIGIN")
            .map(|origin| origin.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| DEFAULT_APP_ORIGIN.to_string()),
        loki_url: env::var("LOKI_URL").ok().filter(|url| !url.is_empty()),
    }
}

fn load_required_config(name: &str) -> String {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| panic!("{} must be set.", name))
}

fn load_parsed_config<T: FromStr>(name: &str, default: T, expected: &str) -> T {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("Invalid config '{}'. Expected {}.", name, expected)),
        Err(_) => default,
    }
}
