use crate::editor::{DisplayModel, EditorPane, RenderTarget};
use crate::identity::FileIdentity;
use crate::view::{FileView, ViewEvent, ViewId, ViewMode};

/// Ordered tabs of FileViews sharing one editor. At most one tab is active;
/// the editor always shows the active tab, or an empty model when there is none.
pub struct TabbedPanel {
    index: usize,
    views: Vec<FileView>,
    active: Option<usize>,
    editor: EditorPane,
    /// Line to mark once the view finishes loading
    pending_highlight: Option<(ViewId, usize)>,
}

impl TabbedPanel {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            views: Vec::new(),
            active: None,
            editor: EditorPane::new(),
            pending_highlight: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn has_content(&self) -> bool {
        !self.views.is_empty()
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active_view(&self) -> Option<&FileView> {
        self.active.and_then(|i| self.views.get(i))
    }

    pub fn editor(&self) -> &EditorPane {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut EditorPane {
        &mut self.editor
    }

    pub fn find(&self, identity: &FileIdentity) -> Option<usize> {
        self.views.iter().position(|v| v.identity() == identity)
    }

    pub fn view_mut(&mut self, id: ViewId) -> Option<&mut FileView> {
        self.views.iter_mut().find(|v| v.id() == id)
    }

    /// Activate the tab for `identity`, creating it with `open` if the panel
    /// does not hold it yet.
    pub fn add_file(
        &mut self,
        identity: FileIdentity,
        open: impl FnOnce(FileIdentity) -> FileView,
    ) -> ViewId {
        if let Some(i) = self.find(&identity) {
            self.activate(i);
            return self.views[i].id();
        }
        let view = open(identity);
        let id = view.id();
        tracing::debug!(panel = self.index, path = view.identity().filepath(), "tab added");
        self.views.push(view);
        self.activate(self.views.len() - 1);
        id
    }

    pub fn activate(&mut self, index: usize) {
        if index >= self.views.len() {
            return;
        }
        self.capture_active();
        self.active = Some(index);
        self.render_active();
    }

    pub fn next_tab(&mut self) {
        if let Some(i) = self.active {
            self.activate((i + 1) % self.views.len());
        }
    }

    pub fn prev_tab(&mut self) {
        if let Some(i) = self.active {
            let len = self.views.len();
            self.activate((i + len - 1) % len);
        }
    }

    pub fn remove_file(&mut self, identity: &FileIdentity) -> bool {
        match self.find(identity) {
            Some(i) => {
                self.remove_at(i);
                true
            }
            None => false,
        }
    }

    /// Remove a tab by view id, returning the removed file's label
    pub fn remove_view(&mut self, id: ViewId) -> Option<String> {
        let i = self.views.iter().position(|v| v.id() == id)?;
        let label = self.views[i].identity().label();
        self.remove_at(i);
        Some(label)
    }

    pub fn remove_active(&mut self) -> Option<String> {
        let id = self.active_view()?.id();
        self.remove_view(id)
    }

    /// Drop every tab. Views unsubscribe as they are dropped.
    pub fn clear(&mut self) {
        self.views.clear();
        self.active = None;
        self.pending_highlight = None;
        self.editor.set_model(DisplayModel::default());
    }

    fn remove_at(&mut self, index: usize) {
        let removed = self.views.remove(index);
        if self.pending_highlight.is_some_and(|(id, _)| id == removed.id()) {
            self.pending_highlight = None;
        }
        drop(removed);

        let Some(active) = self.active else {
            return;
        };
        if self.views.is_empty() {
            self.active = None;
            self.editor.set_model(DisplayModel::default());
        } else if index < active {
            self.active = Some(active - 1);
        } else if index == active {
            // The neighbour takes over; the removed tab's state is gone
            self.active = Some(index.min(self.views.len() - 1));
            self.render_active();
        }
    }

    /// Push the active view's model into the editor
    pub fn render_active(&mut self) {
        let Some(i) = self.active else {
            self.editor.set_model(DisplayModel::default());
            return;
        };
        let view = &mut self.views[i];
        view.display_in(&mut self.editor, None);

        if let Some((id, line)) = self.pending_highlight {
            if id == view.id() && view.is_loaded() {
                self.pending_highlight = None;
                if !self.editor.highlight_line(line) {
                    tracing::debug!(line, "highlighted line not in view");
                }
            }
        }
    }

    pub fn toggle_active_mode(&mut self) -> Option<ViewMode> {
        let i = self.active?;
        self.views[i].capture_view_state(&self.editor);
        let mode = self.views[i].toggle_mode();
        self.render_active();
        Some(mode)
    }

    /// Activate the tab for `identity` and mark `line`. Returns false when
    /// the panel does not hold the file. A view still waiting for its first
    /// update gets the highlight once it arrives.
    pub fn highlight(&mut self, identity: &FileIdentity, line: usize) -> bool {
        let Some(i) = self.find(identity) else {
            return false;
        };
        self.activate(i);
        let view = &self.views[i];
        if !view.is_loaded() {
            self.pending_highlight = Some((view.id(), line));
        } else if !self.editor.highlight_line(line) {
            tracing::debug!(line, path = identity.filepath(), "line not shown in current mode");
        }
        true
    }

    /// React to a view's lifecycle event. Returns a message for the user
    /// when the event closed a tab.
    pub fn on_view_event(&mut self, event: ViewEvent) -> Option<String> {
        match event {
            ViewEvent::Updated(id) => {
                let active = self.active_view().map(FileView::id);
                if active == Some(id) {
                    self.capture_active();
                    self.render_active();
                }
                None
            }
            ViewEvent::Removed(id) => self
                .remove_view(id)
                .map(|label| format!("{} was removed", label)),
        }
    }

    pub fn tab_labels(&self) -> Vec<String> {
        self.views.iter().map(|v| v.identity().label()).collect()
    }

    fn capture_active(&mut self) {
        if let Some(i) = self.active {
            self.views[i].capture_view_state(&self.editor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::testing::connected;
    use crate::connection::{ConnectionManager, FileEvent};
    use crate::protocol::UpdatePayload;

    fn add(panel: &mut TabbedPanel, manager: &ConnectionManager, path: &str, id: u64) -> ViewId {
        panel.add_file(FileIdentity::working(path), |identity| {
            FileView::open(ViewId(id), identity, manager, |_| {})
        })
    }

    fn load(panel: &mut TabbedPanel, id: ViewId, text: &str) {
        let view = panel.view_mut(id).unwrap();
        let identity = view.identity().clone();
        view.apply(&FileEvent::Updated {
            identity,
            payload: UpdatePayload {
                content: Some(text.to_string()),
                ..UpdatePayload::default()
            },
        });
        panel.on_view_event(ViewEvent::Updated(id));
    }

    fn numbered(lines: usize) -> String {
        (1..=lines).map(|i| format!("line {}\n", i)).collect()
    }

    #[test]
    fn add_file_appends_and_activates() {
        let (manager, _t) = connected();
        let mut panel = TabbedPanel::new(0);
        add(&mut panel, &manager, "/a.txt", 1);
        add(&mut panel, &manager, "/b.txt", 2);
        assert_eq!(panel.len(), 2);
        assert_eq!(panel.active_index(), Some(1));
        assert_eq!(panel.tab_labels(), vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn add_existing_file_reactivates_without_new_view() {
        let (manager, _t) = connected();
        let mut panel = TabbedPanel::new(0);
        let first = add(&mut panel, &manager, "/a.txt", 1);
        add(&mut panel, &manager, "/b.txt", 2);
        let again = panel.add_file(FileIdentity::working("/a.txt"), |_| {
            panic!("existing tab must be reused")
        });
        assert_eq!(again, first);
        assert_eq!(panel.len(), 2);
        assert_eq!(panel.active_index(), Some(0));
    }

    #[test]
    fn tab_cycling_wraps() {
        let (manager, _t) = connected();
        let mut panel = TabbedPanel::new(0);
        for (i, p) in ["/a", "/b", "/c"].iter().enumerate() {
            add(&mut panel, &manager, p, i as u64);
        }
        panel.next_tab();
        assert_eq!(panel.active_index(), Some(0));
        panel.prev_tab();
        assert_eq!(panel.active_index(), Some(2));
    }

    #[test]
    fn removing_active_tab_activates_neighbour() {
        let (manager, _t) = connected();
        let mut panel = TabbedPanel::new(0);
        add(&mut panel, &manager, "/a", 1);
        let b = add(&mut panel, &manager, "/b", 2);
        add(&mut panel, &manager, "/c", 3);
        panel.activate(1);
        assert_eq!(panel.remove_view(b).as_deref(), Some("b"));
        assert_eq!(panel.active_view().unwrap().identity().filepath(), "/c");

        panel.remove_file(&FileIdentity::working("/c"));
        assert_eq!(panel.active_view().unwrap().identity().filepath(), "/a");
        panel.remove_file(&FileIdentity::working("/a"));
        assert!(!panel.has_content());
        assert_eq!(panel.active_index(), None);
        assert_eq!(panel.editor().model(), &DisplayModel::default());
    }

    #[test]
    fn removing_earlier_tab_keeps_active_view() {
        let (manager, _t) = connected();
        let mut panel = TabbedPanel::new(0);
        let a = add(&mut panel, &manager, "/a", 1);
        add(&mut panel, &manager, "/b", 2);
        panel.remove_view(a);
        assert_eq!(panel.active_index(), Some(0));
        assert_eq!(panel.active_view().unwrap().identity().filepath(), "/b");
    }

    #[test]
    fn update_rerenders_only_active_view() {
        let (manager, _t) = connected();
        let mut panel = TabbedPanel::new(0);
        let a = add(&mut panel, &manager, "/a", 1);
        add(&mut panel, &manager, "/b", 2);
        load(&mut panel, a, "hidden");
        assert!(matches!(panel.editor().model(), DisplayModel::Empty(_)));

        panel.activate(0);
        assert!(matches!(panel.editor().model(), DisplayModel::Content { text, .. } if text == "hidden"));
    }

    #[test]
    fn scroll_survives_tab_switch_and_updates() {
        let (manager, _t) = connected();
        let mut panel = TabbedPanel::new(0);
        panel.editor_mut().layout(80, 10);
        let a = add(&mut panel, &manager, "/a", 1);
        load(&mut panel, a, &numbered(100));
        panel.editor_mut().scroll_down(25);

        add(&mut panel, &manager, "/b", 2);
        assert_eq!(panel.editor().scroll, 0);
        panel.activate(0);
        assert_eq!(panel.editor().scroll, 25);

        load(&mut panel, a, &numbered(120));
        assert_eq!(panel.editor().scroll, 25);
    }

    #[test]
    fn toggle_active_mode() {
        let (manager, _t) = connected();
        let mut panel = TabbedPanel::new(0);
        assert_eq!(panel.toggle_active_mode(), None);
        let a = add(&mut panel, &manager, "/a", 1);
        load(&mut panel, a, "x");
        assert_eq!(panel.toggle_active_mode(), Some(ViewMode::Diff));
        assert_eq!(panel.editor().model(), &DisplayModel::Empty("No changes".to_string()));
    }

    #[test]
    fn highlight_before_load_applies_on_update() {
        let (manager, _t) = connected();
        let mut panel = TabbedPanel::new(0);
        panel.editor_mut().layout(80, 9);
        let a = add(&mut panel, &manager, "/a", 1);
        add(&mut panel, &manager, "/b", 2);
        assert!(panel.highlight(&FileIdentity::working("/a"), 42));
        assert_eq!(panel.active_index(), Some(0));
        assert_eq!(panel.editor().highlighted(), None);

        load(&mut panel, a, &numbered(100));
        assert_eq!(panel.editor().highlighted(), Some(41));
        assert!(!panel.highlight(&FileIdentity::working("/missing"), 1));
    }

    #[test]
    fn removed_event_closes_tab_and_unsubscribes() {
        let (manager, transport) = connected();
        let mut panel = TabbedPanel::new(0);
        let a = add(&mut panel, &manager, "/a.txt", 1);
        transport.take_sent();
        let msg = panel.on_view_event(ViewEvent::Removed(a));
        assert_eq!(msg.as_deref(), Some("a.txt was removed"));
        assert!(!panel.has_content());
        assert_eq!(
            transport.take_sent(),
            vec![FileIdentity::working("/a.txt").to_unwatch_request()]
        );
        // A second removal for the same view is a no-op
        assert_eq!(panel.on_view_event(ViewEvent::Removed(a)), None);
    }

    #[test]
    fn clear_unsubscribes_everything() {
        let (manager, _t) = connected();
        let mut panel = TabbedPanel::new(0);
        add(&mut panel, &manager, "/a", 1);
        add(&mut panel, &manager, "/b", 2);
        panel.clear();
        assert!(manager.interest_keys().is_empty());
        assert!(!panel.has_content());
    }
}
