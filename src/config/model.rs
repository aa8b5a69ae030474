use crate::geolocation::recenter::RecenterBehavior;
use crate::map::cluster::ClusterOptions;
use crate::map::controller::MapOptions;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub supabase: SupabaseConfig,
    pub map: MapConfig,
    /// Absolute origin of the web app, used for share links and OAuth redirects.
    pub app_origin: String,
    pub loki_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
    pub max_retries: u32,
}

#[derive(Debug, Clone)]
pub struct MapConfig {
    pub cluster_radius: f64,
    pub cluster_max_zoom: u8,
    pub debounce: Duration,
    pub recenter_behavior: RecenterBehavior,
}

impl MapConfig {
    pub fn cluster_options(&self) -> ClusterOptions {
        ClusterOptions {
            radius: self.cluster_radius,
            max_zoom: self.cluster_max_zoom,
            ..ClusterOptions::default()
        }
    }

    pub fn map_options(&self) -> MapOptions {
        let cluster = self.cluster_options();

        MapOptions {
            max_camera_zoom: cluster.max_zoom as f64 + 1.0,
            cluster,
            ..MapOptions::default()
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        let cluster = ClusterOptions::default();

        Self {
            cluster_radius: cluster.radius,
            cluster_max_zoom: cluster.max_zoom,
            debounce: crate::map::debounce::DEFAULT_DEBOUNCE,
            recenter_behavior: RecenterBehavior::default(),
        }
    }
}
