use std::collections::HashMap;

use crate::connection::{ConnectionManager, FileEvent, SubscriberId};
use crate::diff::{full_diff, parse_unified};
use crate::editor::{DisplayModel, RenderTarget, ViewState};
use crate::identity::FileIdentity;
use crate::listeners::{ListenerHandle, Listeners};
use crate::protocol::UpdatePayload;

const NO_CHANGES: &str = "No changes";
const FULL_DIFF_UNAVAILABLE: &str = "Full diff unavailable\n\
The server sent no original/modified content for this file.\n\
Open it with a revision pair to compare complete versions.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub u64);

/// Which rendering of the file is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewMode {
    Content,
    Diff,
    FullDiff,
}

impl ViewMode {
    /// Content → Diff → FullDiff → Content
    pub fn next(self) -> Self {
        match self {
            ViewMode::Content => ViewMode::Diff,
            ViewMode::Diff => ViewMode::FullDiff,
            ViewMode::FullDiff => ViewMode::Content,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ViewMode::Content => "CONTENT",
            ViewMode::Diff => "DIFF",
            ViewMode::FullDiff => "FULL DIFF",
        }
    }
}

/// Lifecycle events a view reports to whoever holds it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewEvent {
    Updated(ViewId),
    Removed(ViewId),
}

/// One subscribed file: latest server payload, lazily built render models,
/// and the cursor/scroll state saved for each mode.
pub struct FileView {
    id: ViewId,
    identity: FileIdentity,
    manager: ConnectionManager,
    subscription: Option<SubscriberId>,
    mode: Option<ViewMode>,
    payload: Option<UpdatePayload>,
    models: HashMap<ViewMode, DisplayModel>,
    view_states: HashMap<ViewMode, ViewState>,
    listeners: Listeners<ViewEvent>,
}

impl FileView {
    /// Create the view and subscribe it. `on_event` receives the inbound
    /// events for this identity; it is expected to hand them back to `apply`.
    pub fn open(
        id: ViewId,
        identity: FileIdentity,
        manager: &ConnectionManager,
        on_event: impl Fn(&FileEvent) + 'static,
    ) -> Self {
        let subscription = manager.subscribe(&identity, on_event);
        Self {
            id,
            identity,
            manager: manager.clone(),
            subscription: Some(subscription),
            mode: None,
            payload: None,
            models: HashMap::new(),
            view_states: HashMap::new(),
            listeners: Listeners::new(),
        }
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn identity(&self) -> &FileIdentity {
        &self.identity
    }

    /// Last used mode, `Content` for a view never displayed
    pub fn mode(&self) -> ViewMode {
        self.mode.unwrap_or(ViewMode::Content)
    }

    pub fn is_loaded(&self) -> bool {
        self.payload.is_some()
    }

    pub fn add_listener(&mut self, callback: impl Fn(&ViewEvent) + 'static) -> ListenerHandle {
        self.listeners.add(callback)
    }

    pub fn remove_listener(&mut self, handle: ListenerHandle) {
        self.listeners.remove(handle);
    }

    /// Take in an inbound event for this view's identity
    pub fn apply(&mut self, event: &FileEvent) {
        if event.identity() != &self.identity {
            tracing::debug!(path = event.identity().filepath(), "event for another identity");
            return;
        }
        match event {
            FileEvent::Updated { payload, .. } => {
                self.payload = Some(payload.clone());
                self.models.clear();
                self.listeners.notify(&ViewEvent::Updated(self.id));
            }
            FileEvent::Removed { .. } => {
                tracing::info!(path = self.identity.filepath(), "file removed on server");
                self.listeners.notify(&ViewEvent::Removed(self.id));
            }
        }
    }

    /// Show this file on `target`. `mode` defaults to the last used one.
    pub fn display_in(&mut self, target: &mut dyn RenderTarget, mode: Option<ViewMode>) {
        let mode = mode.or(self.mode).unwrap_or(ViewMode::Content);
        self.mode = Some(mode);
        let model = match self.models.get(&mode) {
            Some(model) => model.clone(),
            None => {
                let model = self.build_model(mode);
                self.models.insert(mode, model.clone());
                model
            }
        };
        target.set_model(model);
        if let Some(state) = self.view_states.get(&mode) {
            target.restore_view_state(state);
        }
    }

    /// Remember where `target` is scrolled to, for the current mode
    pub fn capture_view_state(&mut self, target: &dyn RenderTarget) {
        if let Some(mode) = self.mode {
            self.view_states.insert(mode, target.save_view_state());
        }
    }

    pub fn toggle_mode(&mut self) -> ViewMode {
        let next = self.mode().next();
        self.mode = Some(next);
        next
    }

    /// Ask the server to re-push this file
    pub fn refresh(&self) {
        self.manager.refresh_for_key(&self.identity);
    }

    /// Unsubscribe and release cached state. Safe to call more than once.
    pub fn dispose(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.manager.unsubscribe(&self.identity, subscription);
        }
        self.payload = None;
        self.models.clear();
        self.view_states.clear();
        self.listeners.clear();
    }

    fn build_model(&self, mode: ViewMode) -> DisplayModel {
        let path = self.identity.filepath();
        let Some(payload) = &self.payload else {
            return DisplayModel::Empty(format!("Waiting for {}…", path));
        };
        if let Some(error) = &payload.error {
            return DisplayModel::Error(error.clone());
        }
        match mode {
            ViewMode::Content => match &payload.content {
                Some(text) => DisplayModel::Content {
                    path: path.to_string(),
                    text: text.clone(),
                },
                None => DisplayModel::Empty("No content available".to_string()),
            },
            ViewMode::Diff => match payload.diff.as_deref().map(|raw| parse_unified(path, raw)) {
                Some(diff) if diff.has_changes() => DisplayModel::Diff(diff),
                _ => DisplayModel::Empty(NO_CHANGES.to_string()),
            },
            ViewMode::FullDiff => match (&payload.original_content, &payload.modified_content) {
                (Some(original), Some(modified)) => {
                    DisplayModel::FullDiff(full_diff(path, original, modified))
                }
                _ => DisplayModel::Error(FULL_DIFF_UNAVAILABLE.to_string()),
            },
        }
    }
}

impl Drop for FileView {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::testing::{connected, MockTransport};
    use crate::editor::EditorPane;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn open_view(manager: &ConnectionManager, path: &str) -> FileView {
        FileView::open(ViewId(1), FileIdentity::working(path), manager, |_| {})
    }

    fn update(identity: &FileIdentity, payload: UpdatePayload) -> FileEvent {
        FileEvent::Updated {
            identity: identity.clone(),
            payload,
        }
    }

    fn setup() -> (ConnectionManager, MockTransport, FileView, EditorPane) {
        let (manager, transport) = connected();
        let view = open_view(&manager, "/a.txt");
        transport.take_sent();
        (manager, transport, view, EditorPane::new())
    }

    #[test]
    fn new_view_shows_content_mode_waiting_message() {
        let (_m, _t, mut view, mut pane) = setup();
        view.display_in(&mut pane, None);
        assert_eq!(view.mode(), ViewMode::Content);
        assert!(matches!(pane.model(), DisplayModel::Empty(msg) if msg.starts_with("Waiting")));
    }

    #[test]
    fn update_fills_content_and_notifies_listeners() {
        let (_m, _t, mut view, mut pane) = setup();
        let events = Rc::new(RefCell::new(Vec::new()));
        let e = events.clone();
        view.add_listener(move |ev| e.borrow_mut().push(*ev));

        let identity = view.identity().clone();
        view.apply(&update(
            &identity,
            UpdatePayload {
                content: Some("hello\nworld\n".to_string()),
                ..UpdatePayload::default()
            },
        ));
        view.display_in(&mut pane, None);
        assert_eq!(
            pane.model(),
            &DisplayModel::Content {
                path: "/a.txt".to_string(),
                text: "hello\nworld\n".to_string()
            }
        );
        assert_eq!(*events.borrow(), vec![ViewEvent::Updated(ViewId(1))]);
    }

    #[test]
    fn toggle_cycles_modes_and_diff_without_payload_shows_no_changes() {
        let (_m, _t, mut view, mut pane) = setup();
        let identity = view.identity().clone();
        view.apply(&update(
            &identity,
            UpdatePayload {
                content: Some("x".to_string()),
                ..UpdatePayload::default()
            },
        ));
        assert_eq!(view.toggle_mode(), ViewMode::Diff);
        view.display_in(&mut pane, None);
        assert_eq!(pane.model(), &DisplayModel::Empty(NO_CHANGES.to_string()));

        assert_eq!(view.toggle_mode(), ViewMode::FullDiff);
        view.display_in(&mut pane, None);
        assert!(matches!(pane.model(), DisplayModel::Error(_)));

        assert_eq!(view.toggle_mode(), ViewMode::Content);
    }

    #[test]
    fn diff_and_full_diff_models_from_payload() {
        let (_m, _t, mut view, mut pane) = setup();
        let identity = view.identity().clone();
        view.apply(&update(
            &identity,
            UpdatePayload {
                content: Some("b\n".to_string()),
                diff: Some("@@ -1 +1 @@\n-a\n+b\n".to_string()),
                original_content: Some("a\n".to_string()),
                modified_content: Some("b\n".to_string()),
                error: None,
            },
        ));
        view.display_in(&mut pane, Some(ViewMode::Diff));
        assert!(matches!(pane.model(), DisplayModel::Diff(d) if d.adds == 1 && d.dels == 1));
        view.display_in(&mut pane, Some(ViewMode::FullDiff));
        assert!(matches!(pane.model(), DisplayModel::FullDiff(d) if d.path == "/a.txt"));
        assert_eq!(view.mode(), ViewMode::FullDiff);
    }

    #[test]
    fn error_payload_renders_error_in_every_mode() {
        let (_m, _t, mut view, mut pane) = setup();
        let identity = view.identity().clone();
        view.apply(&update(
            &identity,
            UpdatePayload {
                error: Some("permission denied".to_string()),
                ..UpdatePayload::default()
            },
        ));
        for mode in [ViewMode::Content, ViewMode::Diff, ViewMode::FullDiff] {
            view.display_in(&mut pane, Some(mode));
            assert_eq!(pane.model(), &DisplayModel::Error("permission denied".to_string()));
        }
    }

    #[test]
    fn view_state_is_saved_per_mode() {
        let (_m, _t, mut view, mut pane) = setup();
        let identity = view.identity().clone();
        let text: Vec<String> = (0..100).map(|i| i.to_string()).collect();
        view.apply(&update(
            &identity,
            UpdatePayload {
                content: Some(text.join("\n")),
                ..UpdatePayload::default()
            },
        ));
        view.display_in(&mut pane, None);
        pane.scroll_down(30);
        view.capture_view_state(&pane);

        view.display_in(&mut pane, Some(ViewMode::Diff));
        assert_eq!(pane.scroll, 0);
        view.capture_view_state(&pane);

        view.display_in(&mut pane, Some(ViewMode::Content));
        assert_eq!(pane.scroll, 30);
    }

    #[test]
    fn removal_is_reported_without_disposing() {
        let (manager, _t, mut view, _pane) = setup();
        let events = Rc::new(RefCell::new(Vec::new()));
        let e = events.clone();
        view.add_listener(move |ev| e.borrow_mut().push(*ev));
        let identity = view.identity().clone();
        view.apply(&FileEvent::Removed { identity: identity.clone() });
        assert_eq!(*events.borrow(), vec![ViewEvent::Removed(ViewId(1))]);
        assert_eq!(manager.subscriber_count(&identity), 1);
    }

    #[test]
    fn removed_listener_stops_receiving_updates() {
        let (_m, _t, mut view, _pane) = setup();
        let hits = Rc::new(RefCell::new(0));
        let h = hits.clone();
        let handle = view.add_listener(move |_| *h.borrow_mut() += 1);
        let identity = view.identity().clone();
        view.apply(&update(&identity, UpdatePayload::default()));
        view.remove_listener(handle);
        view.apply(&update(&identity, UpdatePayload::default()));
        assert_eq!(*hits.borrow(), 1);
        assert!(view.is_loaded());
    }

    #[test]
    fn events_for_other_identities_are_ignored() {
        let (_m, _t, mut view, _pane) = setup();
        view.apply(&update(&FileIdentity::working("/other.txt"), UpdatePayload::default()));
        assert!(!view.is_loaded());
    }

    #[test]
    fn dispose_and_drop_unsubscribe_once() {
        let (manager, transport, mut view, _pane) = setup();
        let identity = view.identity().clone();
        view.dispose();
        assert_eq!(transport.take_sent(), vec![identity.to_unwatch_request()]);
        drop(view);
        assert!(transport.take_sent().is_empty());
        assert!(manager.interest_keys().is_empty());

        let other = open_view(&manager, "/b.txt");
        transport.take_sent();
        drop(other);
        assert_eq!(
            transport.take_sent(),
            vec![FileIdentity::working("/b.txt").to_unwatch_request()]
        );
    }

    #[test]
    fn mode_labels() {
        assert_eq!(ViewMode::Content.label(), "CONTENT");
        assert_eq!(ViewMode::Diff.label(), "DIFF");
        assert_eq!(ViewMode::FullDiff.label(), "FULL DIFF");
    }
}
