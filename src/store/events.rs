use crate::backend::{BackendError, EventBackend};
use crate::geo::BoundingBox;
use crate::supabase::model::{Category, Event, EventAttendee, EventId, EventUpdate, NewEvent, UserId};
use futures::future;
use itertools::Itertools;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

const MAX_AVAILABLE_TAGS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum DateSort {
    #[default]
    Soonest,
    Latest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Map,
    List,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    pub search: String,
    pub category: Option<Category>,
    /// An event must carry every selected tag.
    pub tags: BTreeSet<String>,
    pub date_sort: DateSort,
}

impl Filters {
    pub fn matches(&self, event: &Event) -> bool {
        self.matches_search(event)
            && self.category.map_or(true, |category| event.category == category)
            && self.tags.iter().all(|tag| event.has_tag(tag))
    }

    fn matches_search(&self, event: &Event) -> bool {
        let search = self.search.trim().to_lowercase();
        if search.is_empty() {
            return true;
        }

        [&event.title, &event.description, &event.location]
            .iter()
            .any(|field| field.to_lowercase().contains(&search))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventState {
    pub events: Vec<Event>,
    pub selected_event: Option<Event>,
    pub loading: bool,
    pub filters: Filters,
    pub view_mode: ViewMode,
    pub map_bounds: Option<BoundingBox>,
    /// Last known membership, per event and user.
    pub joined: HashMap<(EventId, UserId), bool>,
    /// Join or leave requests in flight, per event and user.
    pub pending: HashSet<(EventId, UserId)>,
}

impl Default for EventState {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            selected_event: None,
            loading: false,
            filters: Filters::default(),
            view_mode: ViewMode::default(),
            map_bounds: None,
            joined: HashMap::new(),
            pending: HashSet::new(),
        }
    }
}

impl EventState {
    pub fn has_joined(&self, event_id: EventId, user_id: UserId) -> bool {
        self.joined
            .get(&(event_id, user_id))
            .copied()
            .unwrap_or(false)
    }

    pub fn event(&self, event_id: EventId) -> Option<&Event> {
        self.events.iter().find(|event| event.id == event_id)
    }

    /// Events passing the current filters, ordered by start.
    pub fn filtered_events(&self) -> Vec<Event> {
        let filtered = self
            .events
            .iter()
            .filter(|event| self.filters.matches(event))
            .cloned();

        match self.filters.date_sort {
            DateSort::Soonest => filtered.sorted_by_key(Event::starts_at).collect(),
            DateSort::Latest => filtered
                .sorted_by(|a, b| b.starts_at().cmp(&a.starts_at()))
                .collect(),
        }
    }

    pub fn available_tags(&self) -> Vec<String> {
        self.events
            .iter()
            .flat_map(|event| event.tags.iter().cloned())
            .unique()
            .take(MAX_AVAILABLE_TAGS)
            .collect()
    }

    fn adjust_attendees(&mut self, event_id: EventId, adjust: impl Fn(u32) -> u32) {
        self.events
            .iter_mut()
            .chain(self.selected_event.iter_mut())
            .filter(|event| event.id == event_id)
            .for_each(|event| event.attendees_count = adjust(event.attendees_count));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventAction {
    FetchStarted,
    EventsLoaded(Vec<Event>),
    EventSelected(Option<Event>),
    EventCreated(Event),
    EventUpdated(EventId, EventUpdate),
    EventDeleted(EventId),
    /// Rejected when the event is full, the user already joined, or the user has a
    /// request for the event in flight.
    JoinStarted(EventId, UserId),
    /// Rejected when the user has a request for the event in flight.
    LeaveStarted(EventId, UserId),
    Joined(EventId, UserId),
    Left(EventId, UserId),
    MembershipSettled(EventId, UserId),
    MembershipChecked(EventId, UserId, bool),
    SearchChanged(String),
    CategoryChanged(Option<Category>),
    TagsChanged(BTreeSet<String>),
    DateSortChanged(DateSort),
    ViewModeChanged(ViewMode),
    MapBoundsChanged(Option<BoundingBox>),
}

/// Applies `action` to `state`, returning whether anything changed.
pub fn reduce(state: &mut EventState, action: EventAction) -> bool {
    match action {
        EventAction::FetchStarted => !std::mem::replace(&mut state.loading, true),
        EventAction::EventsLoaded(events) => {
            state.events = events;
            state.loading = false;
            true
        }
        EventAction::EventSelected(event) => {
            let changed = state.selected_event != event;
            state.selected_event = event;
            changed
        }
        EventAction::EventCreated(event) => {
            state.events.push(event);
            true
        }
        EventAction::EventUpdated(event_id, update) => {
            state
                .events
                .iter_mut()
                .chain(state.selected_event.iter_mut())
                .filter(|event| event.id == event_id)
                .for_each(|event| update.apply_to(event));
            true
        }
        EventAction::EventDeleted(event_id) => {
            let before = state.events.len();
            state.events.retain(|event| event.id != event_id);
            if state
                .selected_event
                .as_ref()
                .is_some_and(|event| event.id == event_id)
            {
                state.selected_event = None;
            }
            state.joined.retain(|(joined_event, _), _| *joined_event != event_id);
            before != state.events.len()
        }
        EventAction::JoinStarted(event_id, user_id) => {
            !state.event(event_id).is_some_and(Event::is_full)
                && !state.has_joined(event_id, user_id)
                && state.pending.insert((event_id, user_id))
        }
        EventAction::LeaveStarted(event_id, user_id) => state.pending.insert((event_id, user_id)),
        EventAction::Joined(event_id, user_id) => {
            state.adjust_attendees(event_id, |count| count.saturating_add(1));
            state.joined.insert((event_id, user_id), true);
            true
        }
        EventAction::Left(event_id, user_id) => {
            state.adjust_attendees(event_id, |count| count.saturating_sub(1));
            state.joined.insert((event_id, user_id), false);
            true
        }
        EventAction::MembershipSettled(event_id, user_id) => {
            state.pending.remove(&(event_id, user_id))
        }
        EventAction::MembershipChecked(event_id, user_id, joined) => {
            state.joined.insert((event_id, user_id), joined) != Some(joined)
        }
        EventAction::SearchChanged(search) => {
            let changed = state.filters.search != search;
            state.filters.search = search;
            changed
        }
        EventAction::CategoryChanged(category) => {
            let changed = state.filters.category != category;
            state.filters.category = category;
            changed
        }
        EventAction::TagsChanged(tags) => {
            let changed = state.filters.tags != tags;
            state.filters.tags = tags;
            changed
        }
        EventAction::DateSortChanged(date_sort) => {
            let changed = state.filters.date_sort != date_sort;
            state.filters.date_sort = date_sort;
            changed
        }
        EventAction::ViewModeChanged(view_mode) => {
            let changed = state.view_mode != view_mode;
            state.view_mode = view_mode;
            changed
        }
        EventAction::MapBoundsChanged(bounds) => {
            let changed = state.map_bounds != bounds;
            state.map_bounds = bounds;
            changed
        }
    }
}

/// Event list and filter state over an [`EventBackend`].
///
/// Every change goes through [`reduce`] and is broadcast to subscribers. Remote
/// failures are logged and leave the state empty or untouched.
pub struct EventStore<B> {
    backend: B,
    state: watch::Sender<EventState>,
    latest_fetch: AtomicU64,
}

impl<B: EventBackend> EventStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: watch::Sender::new(EventState::default()),
            latest_fetch: AtomicU64::new(0),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn subscribe(&self) -> watch::Receiver<EventState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> EventState {
        self.state.borrow().clone()
    }

    pub fn dispatch(&self, action: EventAction) -> bool {
        self.state.send_if_modified(|state| reduce(state, action))
    }

    /// Loads active events, inside `bounds` when given.
    ///
    /// Returns `false` when a newer fetch started meanwhile and this response was dropped.
    #[instrument(skip(self))]
    pub async fn fetch_events(&self, bounds: Option<BoundingBox>) -> bool {
        let token = self.latest_fetch.fetch_add(1, Ordering::SeqCst) + 1;
        self.dispatch(EventAction::FetchStarted);

        let events = match self.backend.fetch_events(bounds).await {
            Ok(events) => events,
            Err(err) => {
                error!("Error fetching events: {}", err);
                Vec::new()
            }
        };

        if self.latest_fetch.load(Ordering::SeqCst) != token {
            debug!(token, "Discarding stale events response");
            return false;
        }

        info!("Loaded {} events", events.len());
        self.dispatch(EventAction::EventsLoaded(events));
        true
    }

    #[instrument(skip(self))]
    pub async fn fetch_event_by_id(&self, event_id: EventId) -> Option<Event> {
        match self.backend.fetch_event(event_id).await {
            Ok(event) => {
                self.dispatch(EventAction::EventSelected(Some(event.clone())));
                Some(event)
            }
            Err(err) => {
                error!("Error fetching event: {}", err);
                None
            }
        }
    }

    #[instrument(skip_all, fields(title = %new_event.title))]
    pub async fn create_event(&self, new_event: &NewEvent) -> Result<Event, BackendError> {
        let event = self.backend.create_event(new_event).await.inspect_err(|err| {
            error!("Error creating event: {}", err);
        })?;

        info!("Created event {}", event.id);
        self.dispatch(EventAction::EventCreated(event.clone()));
        Ok(event)
    }

    #[instrument(skip(self, update))]
    pub async fn update_event(&self, event_id: EventId, update: EventUpdate) -> Result<(), BackendError> {
        self.backend
            .update_event(event_id, &update)
            .await
            .inspect_err(|err| error!("Error updating event: {}", err))?;

        self.dispatch(EventAction::EventUpdated(event_id, update));
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_event(&self, event_id: EventId) -> Result<(), BackendError> {
        self.backend
            .delete_event(event_id)
            .await
            .inspect_err(|err| error!("Error deleting event: {}", err))?;

        self.dispatch(EventAction::EventDeleted(event_id));
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn join_event(&self, event_id: EventId, user_id: UserId) -> bool {
        if !self.dispatch(EventAction::JoinStarted(event_id, user_id)) {
            warn!("Event is full, already joined or a request is in flight");
            return false;
        }

        let joined = match self.backend.insert_attendee(event_id, user_id).await {
            Ok(()) => {
                self.dispatch(EventAction::Joined(event_id, user_id));
                true
            }
            Err(err) => {
                error!("Join event error: {}", err);
                false
            }
        };

        self.dispatch(EventAction::MembershipSettled(event_id, user_id));
        joined
    }

    #[instrument(skip(self))]
    pub async fn leave_event(&self, event_id: EventId, user_id: UserId) -> bool {
        if !self.dispatch(EventAction::LeaveStarted(event_id, user_id)) {
            warn!("A request for this event is already in flight");
            return false;
        }

        let left = match self.backend.delete_attendee(event_id, user_id).await {
            Ok(()) => {
                self.dispatch(EventAction::Left(event_id, user_id));
                true
            }
            Err(err) => {
                error!("Leave event error: {}", err);
                false
            }
        };

        self.dispatch(EventAction::MembershipSettled(event_id, user_id));
        left
    }

    #[instrument(skip(self))]
    pub async fn has_joined_event(&self, event_id: EventId, user_id: UserId) -> bool {
        match self.backend.find_attendee(event_id, user_id).await {
            Ok(attendee) => {
                let joined = attendee.is_some();
                self.dispatch(EventAction::MembershipChecked(event_id, user_id, joined));
                joined
            }
            Err(err) => {
                error!("Check join error: {}", err);
                false
            }
        }
    }

    /// Membership for several event cards at once, checked concurrently.
    #[instrument(skip(self, event_ids))]
    pub async fn has_joined_events(
        &self,
        event_ids: impl IntoIterator<Item = EventId>,
        user_id: UserId,
    ) -> HashMap<EventId, bool> {
        let checks = event_ids.into_iter().map(|event_id| async move {
            (event_id, self.has_joined_event(event_id, user_id).await)
        });

        future::join_all(checks).await.into_iter().collect()
    }

    #[instrument(skip(self))]
    pub async fn check_in(&self, event_id: EventId, user_id: UserId) -> Result<EventAttendee, BackendError> {
        let attendee = self
            .backend
            .check_in(event_id, user_id)
            .await
            .inspect_err(|err| error!("Check-in error: {}", err))?;

        info!("Checked in");
        self.dispatch(EventAction::MembershipChecked(event_id, user_id, true));
        Ok(attendee)
    }

    pub fn set_search_query(&self, search: impl Into<String>) {
        self.dispatch(EventAction::SearchChanged(search.into()));
    }

    pub fn set_selected_category(&self, category: Option<Category>) {
        self.dispatch(EventAction::CategoryChanged(category));
    }

    pub fn set_selected_tags(&self, tags: impl IntoIterator<Item = String>) {
        self.dispatch(EventAction::TagsChanged(tags.into_iter().collect()));
    }

    pub fn set_date_sort(&self, date_sort: DateSort) {
        self.dispatch(EventAction::DateSortChanged(date_sort));
    }

    pub fn set_view_mode(&self, view_mode: ViewMode) {
        self.dispatch(EventAction::ViewModeChanged(view_mode));
    }

    pub fn set_map_bounds(&self, bounds: Option<BoundingBox>) {
        self.dispatch(EventAction::MapBoundsChanged(bounds));
    }

    pub fn set_selected_event(&self, event: Option<Event>) {
        self.dispatch(EventAction::EventSelected(event));
    }

    pub fn filtered_events(&self) -> Vec<Event> {
        self.state.borrow().filtered_events()
    }

    pub fn available_tags(&self) -> Vec<String> {
        self.state.borrow().available_tags()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, Utc};
    use uuid::Uuid;

    fn event(title: &str, day: u32, tags: &[&str]) -> Event {
        let now = Utc::now();
        Event {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: String::new(),
            location: "Lisboa".to_string(),
            coordinates: None,
            date: NaiveDate::from_ymd_opt(2025, 7, day).unwrap(),
            time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            duration_minutes: 60,
            timezone: None,
            category: Category::Social,
            organizer_id: Uuid::new_v4(),
            organizer: None,
            attendees_count: 0,
            max_attendees: None,
            image_url: None,
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
            status: Default::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test_log::test]
    fn leave_should_never_go_below_zero() {
        let mut state = EventState::default();
        let party = event("Party", 1, &[]);
        let id = party.id;
        let user = Uuid::new_v4();
        reduce(&mut state, EventAction::EventsLoaded(vec![party]));

        reduce(&mut state, EventAction::Left(id, user));

        assert_eq!(state.events[0].attendees_count, 0);
        assert!(!state.has_joined(id, user));
    }

    #[test_log::test]
    fn join_should_be_rejected_while_pending_or_joined() {
        let mut state = EventState::default();
        let id = Uuid::new_v4();
        let user = Uuid::new_v4();

        assert!(reduce(&mut state, EventAction::JoinStarted(id, user)));
        assert!(!reduce(&mut state, EventAction::JoinStarted(id, user)));
        assert!(!reduce(&mut state, EventAction::LeaveStarted(id, user)));

        reduce(&mut state, EventAction::Joined(id, user));
        reduce(&mut state, EventAction::MembershipSettled(id, user));

        assert!(!reduce(&mut state, EventAction::JoinStarted(id, user)));
        assert!(reduce(&mut state, EventAction::LeaveStarted(id, user)));
    }

    #[test_log::test]
    fn join_should_be_rejected_when_full() {
        let mut state = EventState::default();
        let mut party = event("Party", 1, &[]);
        party.max_attendees = Some(2);
        party.attendees_count = 2;
        let id = party.id;
        reduce(&mut state, EventAction::EventsLoaded(vec![party]));

        assert!(!reduce(&mut state, EventAction::JoinStarted(id, Uuid::new_v4())));
        assert!(state.pending.is_empty());

        reduce(&mut state, EventAction::Left(id, Uuid::new_v4()));
        assert!(reduce(&mut state, EventAction::JoinStarted(id, Uuid::new_v4())));
    }

    #[test_log::test]
    fn membership_should_be_tracked_per_user() {
        let mut state = EventState::default();
        let id = Uuid::new_v4();
        let (ana, rui) = (Uuid::new_v4(), Uuid::new_v4());

        reduce(&mut state, EventAction::MembershipChecked(id, ana, true));
        reduce(&mut state, EventAction::MembershipChecked(id, rui, false));

        assert!(state.has_joined(id, ana));
        assert!(!state.has_joined(id, rui));
        assert!(reduce(&mut state, EventAction::JoinStarted(id, rui)));
        assert!(!reduce(&mut state, EventAction::JoinStarted(id, ana)));

        reduce(&mut state, EventAction::EventDeleted(id));
        assert!(state.joined.is_empty());
    }

    #[test_log::test]
    fn filters_should_require_every_selected_tag() {
        let mut state = EventState::default();
        reduce(
            &mut state,
            EventAction::EventsLoaded(vec![
                event("Beach yoga", 3, &["Free", "beach"]),
                event("Beach party", 2, &["beach"]),
                event("Museum night", 1, &["free"]),
            ]),
        );
        reduce(
            &mut state,
            EventAction::TagsChanged(BTreeSet::from(["free".to_string(), "beach".to_string()])),
        );

        let titles = state
            .filtered_events()
            .into_iter()
            .map(|event| event.title)
            .collect::<Vec<_>>();

        assert_eq!(titles, vec!["Beach yoga"]);
    }

    #[test_log::test]
    fn filtered_events_should_follow_date_sort() {
        let mut state = EventState::default();
        reduce(
            &mut state,
            EventAction::EventsLoaded(vec![
                event("Second", 2, &[]),
                event("Third", 3, &[]),
                event("First", 1, &[]),
            ]),
        );

        let titles = |state: &EventState| {
            state
                .filtered_events()
                .into_iter()
                .map(|event| event.title)
                .collect::<Vec<_>>()
        };

        assert_eq!(titles(&state), vec!["First", "Second", "Third"]);

        reduce(&mut state, EventAction::DateSortChanged(DateSort::Latest));
        assert_eq!(titles(&state), vec!["Third", "Second", "First"]);

        reduce(&mut state, EventAction::SearchChanged("  thi ".to_string()));
        assert_eq!(titles(&state), vec!["Third"]);
    }

    #[test_log::test]
    fn available_tags_should_be_unique() {
        let mut state = EventState::default();
        reduce(
            &mut state,
            EventAction::EventsLoaded(vec![
                event("A", 1, &["free", "music"]),
                event("B", 2, &["music", "outdoor"]),
            ]),
        );

        assert_eq!(state.available_tags(), vec!["free", "music", "outdoor"]);
    }

    #[test_log::test]
    fn unchanged_setters_should_not_notify() {
        let mut state = EventState::default();

        assert!(!reduce(&mut state, EventAction::ViewModeChanged(ViewMode::Map)));
        assert!(reduce(&mut state, EventAction::ViewModeChanged(ViewMode::List)));
    }
}
