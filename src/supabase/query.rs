use crate::geo::BoundingBox;
use std::fmt::{Display, Formatter};

pub const EVENTS_TABLE: &str = "events";
pub const ATTENDEES_TABLE: &str = "event_attendees";

/// Events joined with their organizer profile.
pub const EVENT_COLUMNS: &str = "*,organizer:profiles!events_organizer_id_fkey(*)";

/// PostgREST query: a table plus horizontal and vertical filters, rendered as URL parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TableQuery {
    table: &'static str,
    select: Option<String>,
    filters: Vec<(String, String)>,
    limit: Option<usize>,
}

impl TableQuery {
    pub fn from(table: &'static str) -> Self {
        Self {
            table,
            select: None,
            filters: Vec::new(),
            limit: None,
        }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.select = Some(columns.to_string());
        self
    }

    fn filter(mut self, column: &str, operator: &str, value: impl Display) -> Self {
        self.filters
            .push((column.to_string(), format!("{}.{}", operator, value)));
        self
    }

    pub fn eq(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "eq", value)
    }

    pub fn gte(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "gte", value)
    }

    pub fn lte(self, column: &str, value: impl Display) -> Self {
        self.filter(column, "lte", value)
    }

    /// Latitude/longitude range filter. Bounds across the antimeridian are widened
    /// to every longitude, since a single range can't express them.
    pub fn within(self, bounds: &BoundingBox) -> Self {
        let query = self
            .gte("latitude", bounds.south)
            .lte("latitude", bounds.north);

        if bounds.west <= bounds.east {
            query
                .gte("longitude", bounds.west)
                .lte("longitude", bounds.east)
        } else {
            query
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = Vec::with_capacity(self.filters.len() + 2);

        if let Some(select) = &self.select {
            params.push(("select".to_string(), select.to_string()));
        }
        params.extend(self.filters.iter().cloned());
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }

        params
    }
}

impl Display for TableQuery {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let params = self
            .params()
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<String>>()
            .join("&");

        write!(f, "{}?{}", self.table, params)
    }
}
