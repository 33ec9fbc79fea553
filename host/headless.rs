/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! In-process browser: documents, tabs and the tab-scripting API.
//!
//! Scripts "load" by booting the matching context against the document, so
//! the whole background → content script → page world path runs under tokio
//! without a real browser. Used by the CLI driver and the test suites.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

use futures_util::future::BoxFuture;
use ghostshell_comms::ContextAddress;
use ghostshell_core::{CursorPoint, ScrapedMemory, TabId};
use keyboard_types::{Key, Modifiers};
use parking_lot::Mutex;
use tokio::sync::watch;

use super::{
    AttachmentPoint, BrowserTabs, ElementId, FocusedElement, KeyListener, ListenerPhase,
    ListenerToken, PageDocument, PageGlobals, PageScraper, PointerEventKind, PointerListener,
    ScriptLoad, TabInfo,
};
use crate::extension::ExtensionEnv;
use crate::extension::background::{
    ActivationError, ActivationReport, BackgroundHandle, BrowserEvent, TabLoadStatus,
};
use crate::extension::content::ContentScript;
use crate::input::KeyEvent;
use crate::page::world::{PAGE_WORLD_GLOBAL, PageWorld, PageWorldHandle};
use crate::palette::PaletteView;

/// Which structural elements exist yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DocumentShape {
    pub head: bool,
    pub document_element: bool,
    pub body: bool,
}

impl DocumentShape {
    pub const EMPTY: DocumentShape = DocumentShape {
        head: false,
        document_element: false,
        body: false,
    };

    pub const COMPLETE: DocumentShape = DocumentShape {
        head: true,
        document_element: true,
        body: true,
    };

    fn has(self, point: AttachmentPoint) -> bool {
        match point {
            AttachmentPoint::Head => self.head,
            AttachmentPoint::DocumentElement => self.document_element,
            AttachmentPoint::Body => self.body,
        }
    }
}

/// Runs when a script element finishes loading, before `onload`.
pub type ScriptHook = Arc<dyn Fn(Arc<HeadlessDocument>) + Send + Sync>;

struct DocumentContent {
    shape: DocumentShape,
    focused: Option<FocusedElement>,
    title: String,
    body_text: String,
    links: Vec<String>,
    inserted_scripts: Vec<(AttachmentPoint, String)>,
    failing_loads: usize,
    elements: Vec<(String, ElementId)>,
    presented: Option<(ElementId, PaletteView)>,
    key_listeners: Vec<(ListenerPhase, Arc<dyn KeyListener>)>,
    pointer_listeners: Vec<(ListenerToken, PointerEventKind, Arc<dyn PointerListener>)>,
    next_id: u64,
    script_hook: Option<ScriptHook>,
}

pub struct HeadlessDocument {
    url: String,
    this: Weak<HeadlessDocument>,
    globals: PageGlobals,
    ready: watch::Sender<bool>,
    content: Mutex<DocumentContent>,
}

impl HeadlessDocument {
    /// A fully parsed page.
    pub fn new(url: &str) -> Arc<Self> {
        Self::build(url, DocumentShape::COMPLETE, true)
    }

    pub fn with_shape(url: &str, shape: DocumentShape) -> Arc<Self> {
        Self::build(url, shape, true)
    }

    /// A page still parsing: elements exist, `DOMContentLoaded` has not fired.
    pub fn loading(url: &str) -> Arc<Self> {
        Self::build(url, DocumentShape::COMPLETE, false)
    }

    fn build(url: &str, shape: DocumentShape, ready: bool) -> Arc<Self> {
        let (ready, _) = watch::channel(ready);
        Arc::new_cyclic(|this| Self {
            url: url.to_string(),
            this: this.clone(),
            globals: PageGlobals::default(),
            ready,
            content: Mutex::new(DocumentContent {
                shape,
                focused: None,
                title: String::new(),
                body_text: String::new(),
                links: Vec::new(),
                inserted_scripts: Vec::new(),
                failing_loads: 0,
                elements: Vec::new(),
                presented: None,
                key_listeners: Vec::new(),
                pointer_listeners: Vec::new(),
                next_id: 1,
                script_hook: None,
            }),
        })
    }

    pub fn finish_loading(&self) {
        self.ready.send_replace(true);
    }

    pub fn set_shape(&self, shape: DocumentShape) {
        self.content.lock().shape = shape;
    }

    pub fn focus(&self, element: Option<FocusedElement>) {
        self.content.lock().focused = element;
    }

    /// What the scraper will find on the page.
    pub fn set_content(&self, title: &str, body_text: &str, links: Vec<String>) {
        let mut content = self.content.lock();
        content.title = title.to_string();
        content.body_text = body_text.to_string();
        content.links = links;
    }

    pub fn set_script_hook(&self, hook: ScriptHook) {
        self.content.lock().script_hook = Some(hook);
    }

    /// The next `count` script elements fire `onerror` instead of `onload`.
    pub fn fail_next_script_loads(&self, count: usize) {
        self.content.lock().failing_loads = count;
    }

    pub fn inserted_scripts(&self) -> Vec<(AttachmentPoint, String)> {
        self.content.lock().inserted_scripts.clone()
    }

    pub fn render_root_count(&self) -> usize {
        self.content.lock().elements.len()
    }

    pub fn key_listener_count(&self) -> usize {
        self.content.lock().key_listeners.len()
    }

    pub fn pointer_listener_count(&self) -> usize {
        self.content.lock().pointer_listeners.len()
    }

    /// What the render root currently shows.
    pub fn palette_view(&self) -> Option<PaletteView> {
        self.content
            .lock()
            .presented
            .as_ref()
            .map(|(_, view)| view.clone())
    }

    /// Dispatch a `keydown` through every listener phase.
    pub fn key_down(&self, key: Key, modifiers: Modifiers) -> KeyEvent {
        let event = KeyEvent::new(key, modifiers);
        for phase in ListenerPhase::DISPATCH_ORDER {
            let listeners: Vec<_> = self
                .content
                .lock()
                .key_listeners
                .iter()
                .filter(|(registered, _)| *registered == phase)
                .map(|(_, listener)| listener.clone())
                .collect();
            for listener in listeners {
                listener.on_key(&event, phase);
                if event.immediate_propagation_stopped() {
                    break;
                }
            }
            if event.propagation_stopped() {
                break;
            }
        }
        event
    }

    /// Dispatch a document-level mouse event.
    pub fn pointer(&self, kind: PointerEventKind, cursor: CursorPoint) {
        let listeners: Vec<_> = self
            .content
            .lock()
            .pointer_listeners
            .iter()
            .filter(|(_, registered, _)| *registered == kind)
            .map(|(_, _, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener.on_pointer(kind, cursor);
        }
    }

    fn next_id(content: &mut DocumentContent) -> u64 {
        let id = content.next_id;
        content.next_id += 1;
        id
    }
}

impl PageDocument for HeadlessDocument {
    fn url(&self) -> String {
        self.url.clone()
    }

    fn has_attachment_point(&self, point: AttachmentPoint) -> bool {
        self.content.lock().shape.has(point)
    }

    fn insert_script(&self, parent: AttachmentPoint, src: &str) -> ScriptLoad {
        let (fails, hook) = {
            let mut content = self.content.lock();
            content.inserted_scripts.push((parent, src.to_string()));
            let fails = content.failing_loads > 0;
            if fails {
                content.failing_loads -= 1;
            }
            (fails, content.script_hook.clone())
        };
        let document = self.this.upgrade();
        let src = src.to_string();
        Box::pin(async move {
            tokio::task::yield_now().await;
            if fails {
                return Err(format!("failed to load {src}"));
            }
            if let (Some(hook), Some(document)) = (hook, document) {
                hook(document);
            }
            Ok(())
        })
    }

    fn active_element(&self) -> Option<FocusedElement> {
        self.content.lock().focused.clone()
    }

    fn globals(&self) -> &PageGlobals {
        &self.globals
    }

    fn find_element(&self, id: &str) -> Option<ElementId> {
        self.content
            .lock()
            .elements
            .iter()
            .find(|(element_id, _)| element_id == id)
            .map(|(_, element)| *element)
    }

    fn create_render_root(&self, id: &str) -> Option<ElementId> {
        let mut content = self.content.lock();
        if !content.shape.document_element {
            return None;
        }
        let element = ElementId(Self::next_id(&mut content));
        content.elements.push((id.to_string(), element));
        Some(element)
    }

    fn present(&self, root: ElementId, view: Option<&PaletteView>) {
        let mut content = self.content.lock();
        if !content.elements.iter().any(|(_, element)| *element == root) {
            log::warn!("headless: present into unknown element {root:?}");
            return;
        }
        content.presented = view.map(|view| (root, view.clone()));
    }

    fn when_ready(&self) -> BoxFuture<'static, ()> {
        let mut ready = self.ready.subscribe();
        Box::pin(async move {
            let _ = ready.wait_for(|ready| *ready).await;
        })
    }

    fn add_key_listener(&self, phase: ListenerPhase, listener: Arc<dyn KeyListener>) {
        self.content.lock().key_listeners.push((phase, listener));
    }

    fn add_pointer_listener(
        &self,
        kind: PointerEventKind,
        listener: Arc<dyn PointerListener>,
    ) -> ListenerToken {
        let mut content = self.content.lock();
        let token = ListenerToken(Self::next_id(&mut content));
        content.pointer_listeners.push((token, kind, listener));
        token
    }

    fn remove_pointer_listener(&self, token: ListenerToken) {
        self.content
            .lock()
            .pointer_listeners
            .retain(|(registered, _, _)| *registered != token);
    }
}

impl PageScraper for HeadlessDocument {
    fn scrape(&self) -> ScrapedMemory {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default();
        let content = self.content.lock();
        ScrapedMemory::webpage(
            content.title.clone(),
            &content.body_text,
            content.links.clone(),
            self.url.clone(),
            timestamp,
        )
    }
}

#[derive(Clone)]
pub struct HeadlessTab {
    pub info: TabInfo,
    pub document: Arc<HeadlessDocument>,
}

#[derive(Default)]
struct TabStrip {
    tabs: BTreeMap<TabId, HeadlessTab>,
    active: Option<TabId>,
    next_id: u32,
}

/// The background's tab-scripting API over the headless tab strip.
struct TabsPort {
    env: ExtensionEnv,
    strip: Arc<Mutex<TabStrip>>,
}

impl BrowserTabs for TabsPort {
    fn active_tab(&self) -> BoxFuture<'_, Option<TabInfo>> {
        Box::pin(async move {
            let strip = self.strip.lock();
            let active = strip.active?;
            strip.tabs.get(&active).map(|tab| tab.info.clone())
        })
    }

    fn execute_content_script(&self, tab: TabId) -> BoxFuture<'_, Result<(), String>> {
        Box::pin(async move {
            let target = self.strip.lock().tabs.get(&tab).cloned();
            let Some(target) = target else {
                return Err(format!("No tab with id: {}", tab.0));
            };
            if !target.info.is_web_page() {
                return Err("Cannot access contents of the page".to_string());
            }
            tokio::task::yield_now().await;
            ContentScript::boot(&self.env, tab, target.document);
            Ok(())
        })
    }
}

fn page_script_hook(env: ExtensionEnv, tab: TabId) -> ScriptHook {
    Arc::new(move |document: Arc<HeadlessDocument>| {
        PageWorld::boot(&env, tab, document.clone(), document);
    })
}

/// A browser window with the extension installed.
pub struct HeadlessBrowser {
    env: ExtensionEnv,
    strip: Arc<Mutex<TabStrip>>,
    background: BackgroundHandle,
}

impl HeadlessBrowser {
    /// Start the background context. Must run inside a tokio runtime.
    pub fn start(env: ExtensionEnv) -> Self {
        let strip = Arc::new(Mutex::new(TabStrip::default()));
        let port = Arc::new(TabsPort {
            env: env.clone(),
            strip: strip.clone(),
        });
        let background = BackgroundHandle::spawn(&env, port);
        Self {
            env,
            strip,
            background,
        }
    }

    pub fn env(&self) -> &ExtensionEnv {
        &self.env
    }

    /// Open and focus a tab; web pages get the content script declaratively.
    pub fn open_tab(&self, url: &str) -> TabId {
        self.open(url, true)
    }

    /// Open a tab that predates the extension, so it has no content script.
    pub fn open_tab_without_content_script(&self, url: &str) -> TabId {
        self.open(url, false)
    }

    fn open(&self, url: &str, content_script: bool) -> TabId {
        let id = {
            let mut strip = self.strip.lock();
            strip.next_id += 1;
            TabId(strip.next_id)
        };
        self.load(id, url, content_script);
        self.strip.lock().active = Some(id);
        id
    }

    fn load(&self, id: TabId, url: &str, content_script: bool) {
        let document = HeadlessDocument::new(url);
        document.set_script_hook(page_script_hook(self.env.clone(), id));
        let tab = HeadlessTab {
            info: TabInfo {
                id,
                url: url.to_string(),
            },
            document: document.clone(),
        };
        let web_page = tab.info.is_web_page();
        self.strip.lock().tabs.insert(id, tab);

        if content_script && web_page {
            ContentScript::boot(&self.env, id, document);
        }
        self.background.notify(BrowserEvent::TabUpdated {
            tab: id,
            status: TabLoadStatus::Complete,
            url: url.to_string(),
        });
    }

    /// Load a new page in `tab`; every script of the old page is gone.
    pub fn navigate(&self, tab: TabId, url: &str) {
        self.unload(tab);
        self.background.notify(BrowserEvent::TabUpdated {
            tab,
            status: TabLoadStatus::Loading,
            url: url.to_string(),
        });
        self.load(tab, url, true);
    }

    pub fn close_tab(&self, tab: TabId) {
        self.unload(tab);
        {
            let mut strip = self.strip.lock();
            strip.tabs.remove(&tab);
            if strip.active == Some(tab) {
                strip.active = strip.tabs.keys().next_back().copied();
            }
        }
        self.background.notify(BrowserEvent::TabRemoved(tab));
    }

    fn unload(&self, tab: TabId) {
        self.env.bus.unregister(ContextAddress::ContentScript(tab));
        self.env.bus.unregister(ContextAddress::PageWorld(tab));
    }

    pub fn activate(&self, tab: TabId) {
        let mut strip = self.strip.lock();
        if strip.tabs.contains_key(&tab) {
            strip.active = Some(tab);
        }
    }

    pub fn active_tab(&self) -> Option<TabId> {
        self.strip.lock().active
    }

    pub fn document(&self, tab: TabId) -> Option<Arc<HeadlessDocument>> {
        self.strip
            .lock()
            .tabs
            .get(&tab)
            .map(|tab| tab.document.clone())
    }

    /// The page world of `tab`, once the page script has loaded there.
    pub fn page_world(&self, tab: TabId) -> Option<Arc<PageWorldHandle>> {
        self.document(tab)?
            .globals()
            .get::<PageWorldHandle>(PAGE_WORLD_GLOBAL)
    }

    /// The browser fired a registered extension command.
    pub async fn trigger_command(&self, name: &str) -> Result<ActivationReport, ActivationError> {
        self.background.command(name).await
    }

    pub async fn shutdown(&self) {
        self.env.supervisor.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::ExtensionSettings;
    use crate::input::{ActivationShortcut, KeyboardRouter, Platform};
    use ghostshell_comms::test_support::ScriptedBackend;
    use ghostshell_core::protocol::TOGGLE_COMMAND;
    use keyboard_types::NamedKey;

    fn browser() -> HeadlessBrowser {
        HeadlessBrowser::start(ExtensionEnv::new(
            ExtensionSettings::default(),
            Arc::new(ScriptedBackend::new()),
        ))
    }

    struct StopAt(ListenerPhase);

    impl KeyListener for StopAt {
        fn on_key(&self, event: &KeyEvent, phase: ListenerPhase) {
            if phase == self.0 {
                event.stop_propagation();
            }
        }
    }

    struct Count(Mutex<Vec<ListenerPhase>>);

    impl KeyListener for Count {
        fn on_key(&self, _event: &KeyEvent, phase: ListenerPhase) {
            self.0.lock().push(phase);
        }
    }

    #[test]
    fn stopped_propagation_skips_later_phases() {
        let document = HeadlessDocument::new("https://a.test");
        let seen = Arc::new(Count(Mutex::new(Vec::new())));
        for phase in ListenerPhase::DISPATCH_ORDER {
            document.add_key_listener(phase, seen.clone());
        }
        document.add_key_listener(
            ListenerPhase::DocumentCapture,
            Arc::new(StopAt(ListenerPhase::DocumentCapture)),
        );

        document.key_down(Key::Named(NamedKey::Enter), Modifiers::empty());

        assert_eq!(
            *seen.0.lock(),
            [ListenerPhase::WindowCapture, ListenerPhase::DocumentCapture]
        );
    }

    #[test]
    fn activation_shortcut_hides_event_from_same_phase_listeners() {
        let document = HeadlessDocument::new("https://a.test");
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let router = Arc::new(KeyboardRouter::new(
            ActivationShortcut::new(Platform::Other, 'K'),
            document.clone(),
            tx,
        ));
        router.install();
        let seen = Arc::new(Count(Mutex::new(Vec::new())));
        for phase in ListenerPhase::DISPATCH_ORDER {
            document.add_key_listener(phase, seen.clone());
        }

        let event = document.key_down(
            Key::Character("K".to_string()),
            Modifiers::CONTROL | Modifiers::SHIFT,
        );

        assert!(event.immediate_propagation_stopped());
        assert!(seen.0.lock().is_empty());
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn render_root_needs_document_element() {
        let document = HeadlessDocument::with_shape("https://a.test", DocumentShape::EMPTY);
        assert_eq!(document.create_render_root("root"), None);

        document.set_shape(DocumentShape::COMPLETE);
        let root = document.create_render_root("root");
        assert!(root.is_some());
        assert_eq!(document.find_element("root"), root);
    }

    #[test]
    fn scrape_applies_memory_bounds() {
        let document = HeadlessDocument::new("https://a.test/post");
        let links = (0..15).map(|i| format!("https://l{i}.test")).collect();
        document.set_content("", "body", links);

        let memory = document.scrape();

        assert_eq!(memory.title, "Untitled Page");
        assert_eq!(memory.links.len(), 10);
        assert_eq!(memory.url, "https://a.test/post");
    }

    #[tokio::test(start_paused = true)]
    async fn privileged_tab_refuses_content_script() {
        let browser = browser();
        let tab = browser.open_tab("chrome://extensions");

        let result = browser.trigger_command(TOGGLE_COMMAND).await;

        assert!(matches!(
            result,
            Err(ActivationError::ContentScriptInjection { .. })
        ));
        assert!(browser.page_world(tab).is_none());
        browser.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn closing_a_tab_unregisters_its_contexts() {
        let browser = browser();
        let tab = browser.open_tab("https://a.test");
        browser
            .trigger_command(TOGGLE_COMMAND)
            .await
            .expect("palette toggled");
        assert!(browser.env().bus.has_listener(ContextAddress::PageWorld(tab)));

        browser.close_tab(tab);

        assert!(!browser.env().bus.has_listener(ContextAddress::ContentScript(tab)));
        assert!(!browser.env().bus.has_listener(ContextAddress::PageWorld(tab)));
        assert_eq!(browser.active_tab(), None);
        browser.shutdown().await;
    }
}
