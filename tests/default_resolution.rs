//! Default provider resolution.

use pretty_assertions::assert_eq;
use serde_json::json;

use provider_registry::audit::AuditEventType;
use provider_registry::registry::RegistryError;
use provider_registry::store::DocumentStore;

mod common;
use common::Harness;

#[tokio::test]
async fn test_set_then_get_for_every_key_shape() {
    let h = Harness::new();
    let generic = h.create("Generic", "LLM", None, "sk-generic-00000000000").await;
    let openai = h.create("OpenAI", "LLM", Some("OPENAI"), "sk-openai-000000000000").await;

    h.defaults
        .set_default_provider("LLM", Some(&generic), None, "admin")
        .await
        .unwrap();
    h.defaults
        .set_default_provider("LLM", Some(&openai), Some("OPENAI"), "admin")
        .await
        .unwrap();

    let bare = h.defaults.get_default_provider("LLM", None).await.unwrap();
    assert_eq!(bare.id, generic);

    let composite = h.defaults.get_default_provider("LLM", Some("OPENAI")).await.unwrap();
    assert_eq!(composite.id, openai);

    let fallback = h.defaults.get_default_provider("LLM", Some("MISTRAL")).await.unwrap();
    assert_eq!(fallback.id, generic);

    let stored = h.store.get("settings", "defaultProviders").await.unwrap().unwrap();
    assert_eq!(stored.field("LLM_OPENAI"), Some(&json!(openai)));
    h.registry.cleanup().await;
}

#[tokio::test]
async fn test_cleared_default_is_not_found() {
    let h = Harness::new();
    let id = h.create("Texts", "SMS", None, "AC0123456789abcdef").await;
    h.defaults.set_default_provider("SMS", Some(&id), None, "admin").await.unwrap();
    h.defaults.set_default_provider("SMS", None, None, "admin").await.unwrap();

    let result = h.defaults.get_default_provider("SMS", None).await;
    assert!(matches!(result, Err(RegistryError::NotFound(_))));

    let stored = h.store.get("settings", "defaultProviders").await.unwrap().unwrap();
    assert_eq!(stored.field("SMS"), Some(&json!(null)));
    h.registry.cleanup().await;
}

#[tokio::test]
async fn test_unknown_type_is_validation() {
    let h = Harness::new();
    assert!(matches!(
        h.defaults.get_default_provider("FAX", None).await,
        Err(RegistryError::Validation(_))
    ));
    assert!(matches!(
        h.defaults.get_default_provider("LLM", Some("GROK")).await,
        Err(RegistryError::Validation(_))
    ));
}

#[tokio::test]
async fn test_set_default_audits_both_outcomes() {
    let h = Harness::new();
    let id = h.create("Pay", "PAYMENT", None, "sk_live_0123456789abcdef").await;

    h.defaults
        .set_default_provider("PAYMENT", Some(&id), None, "admin")
        .await
        .unwrap();
    let missing = h
        .defaults
        .set_default_provider("PAYMENT", Some("no-such-id"), None, "admin")
        .await;
    assert!(matches!(missing, Err(RegistryError::NotFound(_))));

    let events: Vec<_> = h
        .audit
        .events()
        .into_iter()
        .filter(|e| e.event_type == AuditEventType::DefaultProviderSet)
        .collect();
    assert_eq!(events.len(), 2);
    assert!(events[0].success());
    assert_eq!(events[0].actor_id, "admin");
    assert_eq!(events[0].payload["providerId"], json!(id));
    assert!(!events[1].success());
    assert!(events[1].payload["error"].as_str().unwrap().contains("no-such-id"));

    // The failed call left the mapping alone.
    let view = h.defaults.get_default_provider("PAYMENT", None).await.unwrap();
    assert_eq!(view.id, id);
    h.registry.cleanup().await;
}
