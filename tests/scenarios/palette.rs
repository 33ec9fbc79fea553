/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::time::Duration;

use ghostshell::host::FocusedElement;
use ghostshell::page::{PageEvent, PaletteControl, PointerRegion};
use ghostshell::palette::{ASK_SUGGESTIONS, PaletteTab, SaveStatus};
use ghostshell_comms::{BackendError, RagAnswer};
use ghostshell_core::protocol::TOGGLE_COMMAND;
use ghostshell_core::{ChatSender, CursorPoint};
use keyboard_types::{Modifiers, NamedKey};

use crate::{Harness, PAGE_URL};

async fn save_and_settle(harness: &Harness) {
    harness.send(PageEvent::Click(PaletteControl::Save));
    harness.advance(Duration::from_millis(10)).await;
}

fn ask(harness: &Harness, question: &str) {
    harness.send(PageEvent::Click(PaletteControl::Tab(PaletteTab::Chat)));
    harness.send(PageEvent::ChatInput(question.to_string()));
    harness.send(PageEvent::Click(PaletteControl::Send));
}

#[tokio::test(start_paused = true)]
async fn memory_tab_previews_the_page_on_open() {
    let harness = Harness::opened().await;

    let view = harness.snapshot().await.view.expect("mounted");

    assert_eq!(view.active_tab(), Some(PaletteTab::Memory));
    let preview = view.preview.expect("page was scraped");
    assert_eq!(preview.title, "Understanding ownership");
    assert_eq!(preview.link_count, 1);
    assert_eq!(view.save_button, Some("Save to Memory"));
}

#[tokio::test(start_paused = true)]
async fn saving_twice_is_rejected_without_a_second_backend_call() {
    let harness = Harness::opened().await;

    save_and_settle(&harness).await;
    let snapshot = harness.snapshot().await;
    assert_eq!(snapshot.palette.save_status, SaveStatus::Success);
    assert_eq!(snapshot.saved_urls, [PAGE_URL]);

    save_and_settle(&harness).await;
    let snapshot = harness.snapshot().await;
    assert_eq!(snapshot.palette.save_status, SaveStatus::Error);
    assert_eq!(
        snapshot.palette.save_message,
        "This page is already saved in memory"
    );
    assert_eq!(harness.backend.save_calls(), 1);
    assert_eq!(snapshot.saved_urls.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn save_status_reverts_to_idle_after_three_seconds() {
    let harness = Harness::opened().await;

    save_and_settle(&harness).await;
    assert_eq!(harness.snapshot().await.palette.save_status, SaveStatus::Success);

    harness.advance(Duration::from_millis(2900)).await;
    assert_eq!(harness.snapshot().await.palette.save_status, SaveStatus::Success);

    harness.advance(Duration::from_millis(200)).await;
    let snapshot = harness.snapshot().await;
    assert_eq!(snapshot.palette.save_status, SaveStatus::Idle);
    assert_eq!(
        snapshot.view.and_then(|view| view.save_button),
        Some("Save to Memory")
    );
}

#[tokio::test(start_paused = true)]
async fn failed_save_shows_the_backend_error_then_reverts() {
    let harness = Harness::opened().await;
    harness
        .backend
        .push_save(Err(BackendError::Rejected("disk full".to_string())));

    save_and_settle(&harness).await;
    let snapshot = harness.snapshot().await;
    assert_eq!(snapshot.palette.save_status, SaveStatus::Error);
    assert_eq!(snapshot.palette.save_message, "Failed to save memory: disk full");
    assert!(snapshot.saved_urls.is_empty());

    harness.advance(Duration::from_secs(3)).await;
    assert_eq!(harness.snapshot().await.palette.save_status, SaveStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn ask_list_navigation_wraps_both_ways() {
    let harness = Harness::opened().await;
    harness.press_char("2", Modifiers::empty());

    harness.press_named(NamedKey::ArrowUp, Modifiers::empty());
    let view = harness.snapshot().await.view.expect("mounted");
    assert_eq!(view.active_tab(), Some(PaletteTab::Ask));
    assert_eq!(view.highlighted_item(), Some(ASK_SUGGESTIONS[4]));

    for _ in 0..ASK_SUGGESTIONS.len() + 1 {
        harness.press_named(NamedKey::ArrowDown, Modifiers::empty());
    }
    let snapshot = harness.snapshot().await;
    assert_eq!(snapshot.palette.highlighted_index, 0);
}

#[tokio::test(start_paused = true)]
async fn nudged_position_resets_with_ctrl_r_and_on_reopen() {
    let harness = Harness::opened().await;

    harness.press_named(NamedKey::ArrowRight, Modifiers::CONTROL);
    harness.press_named(NamedKey::ArrowRight, Modifiers::CONTROL);
    harness.press_named(NamedKey::ArrowUp, Modifiers::CONTROL);
    let view = harness.snapshot().await.view.expect("mounted");
    assert_eq!(view.translate, (40, -20));

    harness.press_char("r", Modifiers::CONTROL);
    let view = harness.snapshot().await.view.expect("mounted");
    assert_eq!(view.translate, (0, 0));

    harness.press_named(NamedKey::ArrowLeft, Modifiers::CONTROL);
    let view = harness.snapshot().await.view.expect("mounted");
    assert_eq!(view.translate, (-20, 0));
    harness.browser.trigger_command(TOGGLE_COMMAND).await.expect("close");
    harness.browser.trigger_command(TOGGLE_COMMAND).await.expect("reopen");
    let view = harness.snapshot().await.view.expect("mounted");
    assert_eq!(view.translate, (0, 0));
}

#[tokio::test(start_paused = true)]
async fn dragging_the_header_moves_the_palette() {
    let harness = Harness::opened().await;
    let document = harness.document();

    harness.send(PageEvent::PointerDown {
        region: PointerRegion::Header,
        cursor: CursorPoint::new(400, 300),
    });
    harness.snapshot().await;
    document.pointer(
        ghostshell::host::PointerEventKind::MouseMove,
        CursorPoint::new(350, 320),
    );
    document.pointer(
        ghostshell::host::PointerEventKind::MouseUp,
        CursorPoint::new(350, 320),
    );

    let snapshot = harness.snapshot().await;
    assert!(!snapshot.palette.drag.active);
    assert_eq!(snapshot.view.map(|view| view.translate), Some((-50, 20)));
    assert_eq!(document.pointer_listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn query_failure_adds_exactly_one_error_bubble() {
    let harness = Harness::opened().await;
    harness
        .backend
        .push_query(Err(BackendError::Status(500)));

    ask(&harness, "  what is a lifetime?  ");
    harness.advance(Duration::from_millis(10)).await;

    let snapshot = harness.snapshot().await;
    let messages = snapshot.palette.transcript.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].sender, ChatSender::User);
    assert_eq!(messages[0].text, "what is a lifetime?");
    assert_eq!(messages[1].sender, ChatSender::Bot);
    assert!(messages[1].error);
    assert!(messages[1].text.contains("HTTP error! status: 500"));
    assert!(!snapshot.palette.loading());
    assert_eq!(harness.backend.questions(), ["what is a lifetime?"]);
}

#[tokio::test(start_paused = true)]
async fn answers_carry_source_and_fallback_warning() {
    let harness = Harness::opened().await;
    harness.backend.push_query(Ok(RagAnswer {
        answer: "A region of code where a reference is valid.".to_string(),
        source: "general_knowledge".to_string(),
        hallucinated: true,
    }));

    ask(&harness, "what is a lifetime?");
    harness.advance(Duration::from_millis(10)).await;

    let view = harness.snapshot().await.view.expect("mounted");
    assert_eq!(view.transcript.len(), 2);
    assert_eq!(view.transcript[1].source.as_deref(), Some("general knowledge"));
    assert!(view.transcript[1].fallback_warning);
    assert!(!view.loading);
}

#[tokio::test(start_paused = true)]
async fn enter_in_the_chat_box_sends_and_digits_stay_text() {
    let harness = Harness::opened().await;
    harness.send(PageEvent::Click(PaletteControl::Tab(PaletteTab::Chat)));
    harness
        .document()
        .focus(Some(FocusedElement::tag("textarea")));

    harness.send(PageEvent::ChatInput("rust 2024".to_string()));
    harness.press_char("1", Modifiers::empty());
    harness.press_named(NamedKey::Enter, Modifiers::SHIFT);
    let snapshot = harness.snapshot().await;
    assert_eq!(snapshot.palette.active_tab, PaletteTab::Chat);
    assert!(snapshot.palette.transcript.is_empty());

    harness.press_named(NamedKey::Enter, Modifiers::empty());
    harness.advance(Duration::from_millis(10)).await;
    let snapshot = harness.snapshot().await;
    assert_eq!(snapshot.palette.transcript.len(), 2);
    assert!(snapshot.palette.chat_draft.is_empty());
}

#[tokio::test(start_paused = true)]
async fn answer_arriving_after_close_is_dropped() {
    let harness = Harness::opened().await;
    harness.backend.push_query_after(
        Duration::from_secs(2),
        Ok(RagAnswer {
            answer: "late".to_string(),
            source: "vector_store".to_string(),
            hallucinated: false,
        }),
    );

    ask(&harness, "slow question");
    harness.advance(Duration::from_millis(10)).await;
    assert!(harness.snapshot().await.palette.loading());

    harness.press_named(NamedKey::Escape, Modifiers::empty());
    assert!(!harness.snapshot().await.mount.mounted);
    harness.browser.trigger_command(TOGGLE_COMMAND).await.expect("reopen");
    harness.advance(Duration::from_secs(3)).await;

    let snapshot = harness.snapshot().await;
    assert!(snapshot.mount.mounted);
    assert!(snapshot.palette.transcript.is_empty());
    assert!(!snapshot.palette.loading());
}

#[tokio::test(start_paused = true)]
async fn close_button_and_backdrop_unmount() {
    let harness = Harness::opened().await;

    harness.send(PageEvent::Click(PaletteControl::Close));
    assert!(!harness.snapshot().await.mount.mounted);

    harness.browser.trigger_command(TOGGLE_COMMAND).await.expect("reopen");
    harness.send(PageEvent::PointerDown {
        region: PointerRegion::Backdrop,
        cursor: CursorPoint::new(1, 1),
    });
    assert!(!harness.snapshot().await.mount.mounted);
    assert!(harness.document().palette_view().is_none());
}
