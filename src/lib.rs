pub mod backend;
pub mod geo;
pub mod helpers;
pub mod routes;
pub mod tracing;

pub mod config {
    pub mod env_loader;
    pub mod model;
}

pub mod forms {
    pub mod draft;
    pub mod navigation;
}

pub mod geolocation {
    pub mod location;
    pub mod recenter;
}

pub mod map {
    pub mod cluster;
    pub mod controller;
    pub mod debounce;
    mod kdbush;
    pub mod popup;
    pub mod viewport;
}

pub mod store {
    pub mod auth;
    pub mod events;
}

pub mod supabase {
    pub mod api;
    pub mod dto;
    pub mod model;
    pub mod query;
}
