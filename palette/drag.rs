/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::sync::Arc;

use crate::host::{ListenerToken, PageDocument, PointerEventKind, PointerListener};

/// Document-level `mousemove`/`mouseup` listeners held for one drag.
/// Dropping the guard removes them.
pub struct DragListenerGuard {
    document: Arc<dyn PageDocument>,
    tokens: Vec<ListenerToken>,
}

impl DragListenerGuard {
    pub fn acquire(document: Arc<dyn PageDocument>, listener: Arc<dyn PointerListener>) -> Self {
        let tokens = [PointerEventKind::MouseMove, PointerEventKind::MouseUp]
            .into_iter()
            .map(|kind| document.add_pointer_listener(kind, listener.clone()))
            .collect();
        Self { document, tokens }
    }
}

impl Drop for DragListenerGuard {
    fn drop(&mut self) {
        for token in self.tokens.drain(..) {
            self.document.remove_pointer_listener(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::headless::HeadlessDocument;
    use ghostshell_core::CursorPoint;

    struct Ignore;

    impl PointerListener for Ignore {
        fn on_pointer(&self, _kind: PointerEventKind, _cursor: CursorPoint) {}
    }

    #[test]
    fn listeners_live_exactly_as_long_as_the_guard() {
        let document = HeadlessDocument::new("https://a.test");
        let guard = DragListenerGuard::acquire(document.clone(), Arc::new(Ignore));
        assert_eq!(document.pointer_listener_count(), 2);

        drop(guard);
        assert_eq!(document.pointer_listener_count(), 0);
    }
}
