/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::time::Duration;

use ghostshell::extension::background::ActivationError;
use ghostshell::host::headless::HeadlessDocument;
use ghostshell::host::{AttachmentPoint, FocusedElement, PageDocument};
use ghostshell_comms::ContextAddress;
use ghostshell_core::protocol::TOGGLE_COMMAND;
use keyboard_types::Modifiers;

use crate::{Harness, PAGE_URL};

fn page_scripts(document: &HeadlessDocument) -> usize {
    document.inserted_scripts().len()
}

#[tokio::test(start_paused = true)]
async fn shortcut_command_mounts_then_unmounts() {
    let harness = Harness::new();

    let first = harness
        .browser
        .trigger_command(TOGGLE_COMMAND)
        .await
        .expect("first toggle");
    assert!(first.ack.success);
    assert!(!first.injected_content_script);
    assert!(harness.snapshot().await.mount.mounted);
    assert!(harness.document().palette_view().is_some());

    harness
        .browser
        .trigger_command(TOGGLE_COMMAND)
        .await
        .expect("second toggle");
    let snapshot = harness.snapshot().await;
    assert!(!snapshot.mount.mounted);
    assert!(!snapshot.palette.is_open);
    assert!(harness.document().palette_view().is_none());
    assert_eq!(page_scripts(&harness.document()), 1);
}

#[tokio::test(start_paused = true)]
async fn reloading_the_page_script_keeps_a_single_mount() {
    let harness = Harness::opened().await;
    let document = harness.document();

    // A second copy of the page script lands in the same page.
    document
        .insert_script(AttachmentPoint::Body, "chrome-extension://ghostshell/injected.js")
        .await
        .expect("script loads");

    assert!(harness.snapshot().await.mount.mounted);
    harness
        .browser
        .trigger_command(TOGGLE_COMMAND)
        .await
        .expect("toggle");
    assert!(!harness.snapshot().await.mount.mounted);
    assert_eq!(document.render_root_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn overlapping_toggles_never_double_mount() {
    let harness = Harness::new();

    let (a, b, c) = tokio::join!(
        harness.browser.trigger_command(TOGGLE_COMMAND),
        harness.browser.trigger_command(TOGGLE_COMMAND),
        harness.browser.trigger_command(TOGGLE_COMMAND),
    );

    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    let snapshot = harness.snapshot().await;
    assert!(snapshot.mount.mounted);
    assert_eq!(harness.document().render_root_count(), 1);
    assert_eq!(page_scripts(&harness.document()), 1);
}

#[tokio::test(start_paused = true)]
async fn tab_without_content_script_gets_one_on_demand() {
    let harness = Harness::with_tab(|browser| browser.open_tab_without_content_script(PAGE_URL));
    assert!(
        !harness
            .browser
            .env()
            .bus
            .has_listener(ContextAddress::ContentScript(harness.tab))
    );

    let started = tokio::time::Instant::now();
    let report = harness
        .browser
        .trigger_command(TOGGLE_COMMAND)
        .await
        .expect("toggle after fallback");

    assert!(report.injected_content_script);
    assert!(report.ack.success);
    assert!(started.elapsed() >= Duration::from_millis(500));
    assert!(harness.snapshot().await.mount.mounted);
}

#[tokio::test(start_paused = true)]
async fn privileged_pages_are_skipped_silently() {
    let harness = Harness::with_tab(|browser| browser.open_tab("chrome://newtab"));

    let result = harness.browser.trigger_command(TOGGLE_COMMAND).await;

    assert!(matches!(
        result,
        Err(ActivationError::ContentScriptInjection { .. })
    ));
    assert!(harness.browser.page_world(harness.tab).is_none());
}

#[tokio::test(start_paused = true)]
async fn toggle_goes_to_the_active_tab_only() {
    let harness = Harness::new();
    let other = harness.browser.open_tab("https://other.test/");
    harness.browser.activate(harness.tab);

    harness
        .browser
        .trigger_command(TOGGLE_COMMAND)
        .await
        .expect("toggle");

    assert!(harness.snapshot().await.mount.mounted);
    assert!(harness.browser.page_world(other).is_none());
}

#[tokio::test(start_paused = true)]
async fn local_shortcut_toggles_without_the_background() {
    let harness = Harness::new();
    // Keyboard listeners go in once the content script saw the document ready.
    harness.advance(Duration::from_millis(10)).await;

    harness.press_shortcut();
    harness.advance(Duration::from_secs(1)).await;
    assert!(harness.snapshot().await.mount.mounted);

    harness.press_shortcut();
    harness.advance(Duration::from_secs(1)).await;
    assert!(!harness.snapshot().await.mount.mounted);
}

#[tokio::test(start_paused = true)]
async fn shortcut_typed_into_a_text_field_is_left_to_the_page() {
    let harness = Harness::new();
    harness.advance(Duration::from_millis(10)).await;
    let document = harness.document();
    document.focus(Some(FocusedElement::tag("textarea")));

    let event = document.key_down(
        keyboard_types::Key::Character("K".to_string()),
        Modifiers::CONTROL | Modifiers::SHIFT,
    );
    harness.advance(Duration::from_secs(1)).await;

    assert!(!event.default_prevented());
    assert!(harness.browser.page_world(harness.tab).is_none());
    assert_eq!(page_scripts(&document), 0);

    document.focus(Some(FocusedElement::tag("div").with_role("combobox")));
    harness.press_shortcut();
    harness.advance(Duration::from_secs(1)).await;
    assert!(harness.browser.page_world(harness.tab).is_none());

    document.focus(None);
    harness.press_shortcut();
    harness.advance(Duration::from_secs(1)).await;
    assert!(harness.snapshot().await.mount.mounted);
}

#[tokio::test(start_paused = true)]
async fn navigation_starts_from_a_fresh_page() {
    let harness = Harness::opened().await;
    let before = harness.document();

    harness.browser.navigate(harness.tab, "https://blog.test/posts/borrowing");
    let after = harness.document();
    assert_eq!(after.url(), "https://blog.test/posts/borrowing");
    assert!(harness.browser.page_world(harness.tab).is_none());

    harness
        .browser
        .trigger_command(TOGGLE_COMMAND)
        .await
        .expect("toggle on new page");

    assert!(harness.snapshot().await.mount.mounted);
    assert_eq!(page_scripts(&after), 1);
    assert_eq!(page_scripts(&before), 1);
}
