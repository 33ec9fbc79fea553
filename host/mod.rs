/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Ports to the browser.
//!
//! Everything the extension needs from a page or from the tab-scripting API
//! goes through the traits below. [`headless`] implements them in-process.

pub mod headless;

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use ghostshell_core::{CursorPoint, ScrapedMemory, TabId};
use parking_lot::Mutex;

use crate::input::KeyEvent;
use crate::palette::PaletteView;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ElementId(pub u64);

/// Where a `<script>` element may be appended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachmentPoint {
    Head,
    DocumentElement,
    Body,
}

impl AttachmentPoint {
    pub const PREFERENCE: [AttachmentPoint; 3] = [
        AttachmentPoint::Head,
        AttachmentPoint::DocumentElement,
        AttachmentPoint::Body,
    ];

    pub fn tag_name(self) -> &'static str {
        match self {
            AttachmentPoint::Head => "HEAD",
            AttachmentPoint::DocumentElement => "HTML",
            AttachmentPoint::Body => "BODY",
        }
    }
}

/// The parts of `document.activeElement` the keyboard filter looks at.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FocusedElement {
    /// Upper-case, as reported by the DOM.
    pub tag_name: String,
    pub content_editable: bool,
    pub name: Option<String>,
    pub role: Option<String>,
    pub class_list: Vec<String>,
}

impl FocusedElement {
    pub fn tag(tag_name: &str) -> Self {
        Self {
            tag_name: tag_name.to_ascii_uppercase(),
            ..Self::default()
        }
    }

    pub fn editable(mut self) -> Self {
        self.content_editable = true;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.role = Some(role.to_string());
        self
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.class_list.push(class.to_string());
        self
    }
}

/// Key listener registration slots, in dispatch order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ListenerPhase {
    WindowCapture,
    DocumentCapture,
    DocumentBubble,
    WindowBubble,
}

impl ListenerPhase {
    pub const DISPATCH_ORDER: [ListenerPhase; 4] = [
        ListenerPhase::WindowCapture,
        ListenerPhase::DocumentCapture,
        ListenerPhase::DocumentBubble,
        ListenerPhase::WindowBubble,
    ];
}

pub trait KeyListener: Send + Sync {
    fn on_key(&self, event: &KeyEvent, phase: ListenerPhase);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointerEventKind {
    MouseMove,
    MouseUp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerToken(pub u64);

pub trait PointerListener: Send + Sync {
    fn on_pointer(&self, kind: PointerEventKind, cursor: CursorPoint);
}

/// Resolves once the script element finished loading, or with the load error.
pub type ScriptLoad = BoxFuture<'static, Result<(), String>>;

/// Typed `window` properties shared by every script loaded into one page.
#[derive(Default)]
pub struct PageGlobals {
    slots: Mutex<HashMap<&'static str, Arc<dyn Any + Send + Sync>>>,
}

impl PageGlobals {
    pub fn get<T: Any + Send + Sync>(&self, key: &'static str) -> Option<Arc<T>> {
        let slot = self.slots.lock().get(key).cloned()?;
        slot.downcast::<T>().ok()
    }

    /// Returns the existing value under `key`, or stores `init()`. The flag is
    /// `true` when this call created the value.
    pub fn get_or_insert_with<T: Any + Send + Sync>(
        &self,
        key: &'static str,
        init: impl FnOnce() -> T,
    ) -> (Arc<T>, bool) {
        let mut slots = self.slots.lock();
        if let Some(existing) = slots.get(key).cloned() {
            match existing.downcast::<T>() {
                Ok(value) => return (value, false),
                Err(_) => log::warn!("page globals: {key} held a foreign value, replacing"),
            }
        }
        let value = Arc::new(init());
        slots.insert(key, value.clone());
        (value, true)
    }
}

/// One page load in one tab.
pub trait PageDocument: Send + Sync {
    fn url(&self) -> String;

    fn has_attachment_point(&self, point: AttachmentPoint) -> bool;

    fn insert_script(&self, parent: AttachmentPoint, src: &str) -> ScriptLoad;

    fn active_element(&self) -> Option<FocusedElement>;

    fn globals(&self) -> &PageGlobals;

    fn find_element(&self, id: &str) -> Option<ElementId>;

    /// Append a container `<div id=..>`. `None` while the document has no
    /// element to hold it.
    fn create_render_root(&self, id: &str) -> Option<ElementId>;

    /// Replace what `root` shows; `None` clears it.
    fn present(&self, root: ElementId, view: Option<&PaletteView>);

    /// Resolves once the DOM is parsed (`DOMContentLoaded` or later).
    fn when_ready(&self) -> BoxFuture<'static, ()>;

    fn add_key_listener(&self, phase: ListenerPhase, listener: Arc<dyn KeyListener>);

    fn add_pointer_listener(
        &self,
        kind: PointerEventKind,
        listener: Arc<dyn PointerListener>,
    ) -> ListenerToken;

    fn remove_pointer_listener(&self, token: ListenerToken);
}

/// Produces the snapshot offered for saving on the Memory tab.
pub trait PageScraper: Send + Sync {
    fn scrape(&self) -> ScrapedMemory;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TabInfo {
    pub id: TabId,
    pub url: String,
}

impl TabInfo {
    /// Content scripts only run on web pages.
    pub fn is_web_page(&self) -> bool {
        self.url.starts_with("http://") || self.url.starts_with("https://")
    }
}

/// The background's view of the browser's tab-scripting API.
pub trait BrowserTabs: Send + Sync {
    fn active_tab(&self) -> BoxFuture<'_, Option<TabInfo>>;

    /// Programmatically load the content script into `tab`. Fails on
    /// privileged pages.
    fn execute_content_script(&self, tab: TabId) -> BoxFuture<'_, Result<(), String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn globals_memoize_first_value() {
        let globals = PageGlobals::default();
        let (first, created) = globals.get_or_insert_with("__counter", || 1_u32);
        assert!(created);
        let (second, created) = globals.get_or_insert_with("__counter", || 2_u32);
        assert!(!created);
        assert_eq!((*first, *second), (1, 1));
        assert_eq!(globals.get::<u32>("__counter").as_deref(), Some(&1));
    }

    #[test]
    fn globals_replace_value_of_other_type() {
        let globals = PageGlobals::default();
        globals.get_or_insert_with("__slot", || "text");
        let (value, created) = globals.get_or_insert_with("__slot", || 5_u8);
        assert!(created);
        assert_eq!(*value, 5);
        assert!(globals.get::<&str>("__slot").is_none());
    }

    #[test]
    fn only_http_tabs_are_web_pages() {
        let tab = |url: &str| TabInfo {
            id: TabId(1),
            url: url.to_string(),
        };
        assert!(tab("https://a.test").is_web_page());
        assert!(tab("http://a.test").is_web_page());
        assert!(!tab("chrome://extensions").is_web_page());
        assert!(!tab("file:///tmp/a.html").is_web_page());
    }
}
