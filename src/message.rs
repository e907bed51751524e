//! Messages from embedded pages and their routing to the active scene.
//!
//! Embedded pages post JSON objects of the form
//! `{ "type": "closeAdPopup", "payload": ... }`. Anything that does not
//! decode into a known [`MessageKind`] is dropped.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::scene::SceneId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageKind {
    UserInteractionClick,
    PaymentConfirmed,
    StartTransitionGlitch,
    StartDownload,
    OpenPurchaseScreen,
    NavigateBrowser,
    CloseAdPopup,
    CloseApparelAdPopup,
    LoadSubscriptionPage,
    CloseCardEntryPopup,
    LoadCardEntryPage,
    CloseSubscriptionPopup,
}

/// A decoded message. The payload is carried but never interpreted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Message {
    pub fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            payload: None,
        }
    }

    /// Decode raw message text. Malformed JSON, a missing `type` or an
    /// unknown `type` all yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match serde_json::from_str::<Message>(raw) {
            Ok(message) => Some(message),
            Err(err) => {
                debug!("ignoring message {raw:?}: {err}");
                None
            }
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// What a routed message asks the session to do.
///
/// Every recognized message also counts as user activity; kinds without an
/// action in the current scene do nothing else.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    BeginTransition,
    ShortGlitch,
    CloseAd,
    CloseApparelAd,
    OpenSubscription,
    CloseSubscription,
    OpenCardEntry,
    ConfirmPayment,
}

fn desk_action(kind: MessageKind) -> Option<Action> {
    match kind {
        MessageKind::StartTransitionGlitch => Some(Action::BeginTransition),
        MessageKind::PaymentConfirmed => Some(Action::ShortGlitch),
        _ => None,
    }
}

fn world_action(kind: MessageKind) -> Option<Action> {
    match kind {
        MessageKind::PaymentConfirmed => Some(Action::ShortGlitch),
        MessageKind::CloseAdPopup => Some(Action::CloseAd),
        MessageKind::CloseApparelAdPopup => Some(Action::CloseApparelAd),
        MessageKind::LoadSubscriptionPage => Some(Action::OpenSubscription),
        MessageKind::CloseSubscriptionPopup => Some(Action::CloseSubscription),
        MessageKind::LoadCardEntryPage => Some(Action::OpenCardEntry),
        MessageKind::CloseCardEntryPopup => Some(Action::ConfirmPayment),
        _ => None,
    }
}

/// The single message channel shared by both scenes.
///
/// At most one scene owns the handler at a time. Installing a handler
/// replaces the previous one in the same call, so no message can reach a
/// scene that has already been torn down.
#[derive(Debug, Default)]
pub struct MessageBridge {
    route: Option<SceneId>,
}

impl MessageBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&mut self, scene: SceneId) {
        if let Some(previous) = self.route.replace(scene) {
            if previous != scene {
                info!("message handler moved from {previous} to {scene}");
            }
        } else {
            debug!("message handler installed for {scene}");
        }
    }

    /// Remove the handler if `scene` owns it.
    pub fn remove(&mut self, scene: SceneId) -> bool {
        if self.route == Some(scene) {
            self.route = None;
            debug!("message handler removed for {scene}");
            true
        } else {
            false
        }
    }

    pub fn route(&self) -> Option<SceneId> {
        self.route
    }

    /// Map a message to the action of the scene currently owning the
    /// handler.
    pub fn dispatch(&self, message: &Message) -> Option<Action> {
        match self.route {
            Some(SceneId::Desk) => desk_action(message.kind),
            Some(SceneId::World) => world_action(message.kind),
            None => {
                debug!("no handler installed, dropping {:?}", message.kind);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_messages_with_and_without_payload() {
        let plain = Message::parse(r#"{"type":"closeAdPopup"}"#).unwrap();
        assert_eq!(plain.kind, MessageKind::CloseAdPopup);
        assert!(plain.payload.is_none());

        let with_payload =
            Message::parse(r#"{"type":"navigateBrowser","payload":{"url":"x"}}"#).unwrap();
        assert_eq!(with_payload.kind, MessageKind::NavigateBrowser);
        assert_eq!(with_payload.payload.unwrap()["url"], "x");
    }

    #[test]
    fn malformed_and_unknown_messages_are_ignored() {
        assert!(Message::parse("").is_none());
        assert!(Message::parse("not json").is_none());
        assert!(Message::parse(r#"{"payload":1}"#).is_none());
        assert!(Message::parse(r#"{"type":"selfDestruct"}"#).is_none());
        assert!(Message::parse(r#"{"type":42}"#).is_none());
        assert!(Message::parse("[]").is_none());
    }

    #[test]
    fn wire_names_are_camel_case() {
        let json = Message::new(MessageKind::LoadCardEntryPage).to_json();
        assert_eq!(json, r#"{"type":"loadCardEntryPage"}"#);
    }

    #[test]
    fn routing_follows_the_installed_scene() {
        let mut bridge = MessageBridge::new();
        let close = Message::new(MessageKind::CloseCardEntryPopup);
        let start = Message::new(MessageKind::StartTransitionGlitch);

        assert_eq!(bridge.dispatch(&start), None);

        bridge.install(SceneId::Desk);
        assert_eq!(bridge.dispatch(&start), Some(Action::BeginTransition));
        assert_eq!(bridge.dispatch(&close), None);

        bridge.install(SceneId::World);
        assert_eq!(bridge.dispatch(&start), None);
        assert_eq!(bridge.dispatch(&close), Some(Action::ConfirmPayment));
    }

    #[test]
    fn removal_only_applies_to_the_owner() {
        let mut bridge = MessageBridge::new();
        bridge.install(SceneId::World);
        assert!(!bridge.remove(SceneId::Desk));
        assert_eq!(bridge.route(), Some(SceneId::World));
        assert!(bridge.remove(SceneId::World));
        assert_eq!(
            bridge.dispatch(&Message::new(MessageKind::CloseAdPopup)),
            None
        );
    }
}
