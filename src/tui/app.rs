use crate::k8s::watch::{
    ConnectionState, HasIdentity, ResourceKind, WatchError, WatchEvent, WatchEventKind,
};
use crate::tui::style::{ITEM_HEIGHT, PALETTES, TableColors};
use chrono::{DateTime, Duration, Utc};
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::widgets::{ScrollbarState, TableState};
use std::collections::BTreeMap;

/// One object as shown in a resource table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Row {
    pub namespace: String,
    pub name: String,
    pub summary: String,
    pub last_event: WatchEventKind,
    pub updated: DateTime<Utc>,
    pub created: Option<DateTime<Utc>>,
}

impl Row {
    pub(crate) fn cells(&self, now: DateTime<Utc>) -> [String; 5] {
        let age = self
            .created
            .map(|created| format_duration(now.signed_duration_since(created)))
            .unwrap_or_default();
        [
            self.namespace.clone(),
            self.name.clone(),
            self.summary.clone(),
            self.last_event.to_string(),
            age,
        ]
    }
}

/// Live contents of one resource kind, keyed by `(namespace, name)`
#[derive(Clone, Debug, Default)]
pub struct ResourceTable {
    rows: BTreeMap<(String, String), Row>,
}

impl ResourceTable {
    /// Fold one watch event into the table
    pub fn apply(&mut self, event: &WatchEvent) {
        let (namespace, name) = event.object.namespace_name();
        let Some(name) = name else {
            return;
        };
        let key = (namespace.unwrap_or_default().to_string(), name.to_string());

        match event.event {
            WatchEventKind::Added | WatchEventKind::Modified => {
                let row = Row {
                    namespace: key.0.clone(),
                    name: key.1.clone(),
                    summary: event.kind.summarize(&event.object),
                    last_event: event.event,
                    updated: event.received_at,
                    created: event
                        .object
                        .metadata
                        .creation_timestamp
                        .as_ref()
                        .map(|t| t.0),
                };
                self.rows.insert(key, row);
            }
            WatchEventKind::Deleted => {
                self.rows.remove(&key);
            }
            WatchEventKind::Bookmark | WatchEventKind::Error => {}
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.values()
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<&Row> {
        self.rows.get(&(namespace.to_string(), name.to_string()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

/// What the event loop should do after a key press
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    None,
    Quit,
    RestartWatcher(ResourceKind),
    RestartAll,
    SetDebug(bool),
    UpdateNamespace(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Browse,
    EditNamespace,
}

#[derive(Clone, Debug)]
pub struct App {
    pub kinds: Vec<ResourceKind>,
    pub selected_kind: usize,
    pub tables: BTreeMap<ResourceKind, ResourceTable>,
    pub state: TableState,
    pub scroll_state: ScrollbarState,
    pub colors: TableColors,
    pub color_index: usize,
    pub namespace: String,
    pub overall: ConnectionState,
    pub connection_states: BTreeMap<ResourceKind, ConnectionState>,
    pub resource_versions: BTreeMap<ResourceKind, String>,
    pub last_error: Option<WatchError>,
    pub status_message: Option<String>,
    pub debug: bool,
    pub mode: Mode,
    pub namespace_input: String,
    pub events_seen: u64,
}

impl App {
    #[must_use]
    pub fn new(kinds: Vec<ResourceKind>, namespace: String) -> Self {
        let tables = kinds
            .iter()
            .map(|kind| (*kind, ResourceTable::default()))
            .collect();
        Self {
            kinds,
            selected_kind: 0,
            tables,
            state: TableState::default().with_selected(0),
            scroll_state: ScrollbarState::new(0),
            colors: TableColors::new(&PALETTES[0]),
            color_index: 0,
            namespace,
            overall: ConnectionState::Disconnected,
            connection_states: BTreeMap::new(),
            resource_versions: BTreeMap::new(),
            last_error: None,
            status_message: None,
            debug: false,
            mode: Mode::Browse,
            namespace_input: String::new(),
            events_seen: 0,
        }
    }

    #[must_use]
    pub fn selected_kind(&self) -> Option<ResourceKind> {
        self.kinds.get(self.selected_kind).copied()
    }

    #[must_use]
    pub fn selected_table(&self) -> Option<&ResourceTable> {
        self.selected_kind().and_then(|kind| self.tables.get(&kind))
    }

    pub fn apply_event(&mut self, event: &WatchEvent) {
        // queued events from a previous namespace may still arrive after a switch
        if !self.namespace.is_empty() {
            if let Some(ns) = event.namespace() {
                if ns != self.namespace {
                    return;
                }
            }
        }
        self.events_seen += 1;
        self.tables.entry(event.kind).or_default().apply(event);
        if Some(event.kind) == self.selected_kind() {
            self.update_scroll();
        }
    }

    pub fn apply_error(&mut self, err: WatchError) {
        self.last_error = Some(err);
    }

    pub fn set_connection_states(
        &mut self,
        overall: ConnectionState,
        states: BTreeMap<ResourceKind, ConnectionState>,
        versions: BTreeMap<ResourceKind, String>,
    ) {
        self.overall = overall;
        self.connection_states = states;
        self.resource_versions = versions;
    }

    pub fn clear_table(&mut self, kind: ResourceKind) {
        if let Some(table) = self.tables.get_mut(&kind) {
            table.clear();
        }
        self.reset_selection();
    }

    pub fn clear_all(&mut self) {
        self.tables.values_mut().for_each(ResourceTable::clear);
        self.last_error = None;
        self.reset_selection();
    }

    pub fn set_namespace(&mut self, namespace: String) {
        self.namespace = namespace;
        self.clear_all();
    }

    pub fn next_kind(&mut self) {
        if !self.kinds.is_empty() {
            self.selected_kind = (self.selected_kind + 1) % self.kinds.len();
            self.reset_selection();
        }
    }

    pub fn previous_kind(&mut self) {
        if !self.kinds.is_empty() {
            self.selected_kind = (self.selected_kind + self.kinds.len() - 1) % self.kinds.len();
            self.reset_selection();
        }
    }

    pub fn next_row(&mut self) {
        let len = self.selected_table().map_or(0, ResourceTable::len);
        if len == 0 {
            return;
        }
        let i = self.state.selected().map_or(0, |i| if i + 1 >= len { 0 } else { i + 1 });
        self.state.select(Some(i));
        self.scroll_state = self.scroll_state.position(i * ITEM_HEIGHT);
    }

    pub fn previous_row(&mut self) {
        let len = self.selected_table().map_or(0, ResourceTable::len);
        if len == 0 {
            return;
        }
        let i = self.state.selected().map_or(0, |i| if i == 0 { len - 1 } else { i - 1 });
        self.state.select(Some(i));
        self.scroll_state = self.scroll_state.position(i * ITEM_HEIGHT);
    }

    pub fn next_color(&mut self) {
        self.color_index = (self.color_index + 1) % PALETTES.len();
        self.colors = TableColors::new(&PALETTES[self.color_index]);
    }

    fn reset_selection(&mut self) {
        self.state = TableState::default().with_selected(0);
        self.update_scroll();
    }

    fn update_scroll(&mut self) {
        let len = self.selected_table().map_or(0, ResourceTable::len);
        self.scroll_state = self
            .scroll_state
            .content_length(len.saturating_sub(1) * ITEM_HEIGHT);
    }

    /// Translate a terminal event into an action, updating local view state
    pub fn handle_event(&mut self, event: &Event) -> Action {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => match self.mode {
                Mode::Browse => self.handle_browse_key(key),
                Mode::EditNamespace => self.handle_namespace_key(key),
            },
            _ => Action::None,
        }
    }

    fn handle_browse_key(&mut self, key: &KeyEvent) -> Action {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Action::Quit,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Action::Quit;
            }
            KeyCode::Tab | KeyCode::Right => self.next_kind(),
            KeyCode::BackTab | KeyCode::Left => self.previous_kind(),
            KeyCode::Char('j') | KeyCode::Down => self.next_row(),
            KeyCode::Char('k') | KeyCode::Up => self.previous_row(),
            KeyCode::Char('c') => self.next_color(),
            KeyCode::Char('r') => {
                if let Some(kind) = self.selected_kind() {
                    self.clear_table(kind);
                    return Action::RestartWatcher(kind);
                }
            }
            KeyCode::Char('R') => {
                self.clear_all();
                return Action::RestartAll;
            }
            KeyCode::Char('d') => {
                self.debug = !self.debug;
                return Action::SetDebug(self.debug);
            }
            KeyCode::Char('n') => {
                self.namespace_input = self.namespace.clone();
                self.mode = Mode::EditNamespace;
            }
            _ => {}
        }
        Action::None
    }

    fn handle_namespace_key(&mut self, key: &KeyEvent) -> Action {
        match key.code {
            KeyCode::Esc => self.mode = Mode::Browse,
            KeyCode::Enter => {
                self.mode = Mode::Browse;
                let namespace = self.namespace_input.trim().to_string();
                if namespace != self.namespace {
                    self.set_namespace(namespace.clone());
                    return Action::UpdateNamespace(namespace);
                }
            }
            KeyCode::Backspace => {
                self.namespace_input.pop();
            }
            KeyCode::Char(c) => self.namespace_input.push(c),
            _ => {}
        }
        Action::None
    }
}

#[must_use]
pub fn format_duration(duration: Duration) -> String {
    if duration.num_days() > 0 {
        format!("{}d", duration.num_days())
    } else if duration.num_hours() > 0 {
        format!("{}h", duration.num_hours())
    } else if duration.num_minutes() > 0 {
        format!("{}m", duration.num_minutes())
    } else {
        format!("{}s", duration.num_seconds().max(0))
    }
}
