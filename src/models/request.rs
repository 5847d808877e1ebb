use serde::Deserialize;
use utoipa::ToSchema;

/// Corpo della richiesta di submit
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitRequest {
    /// Payload inoltrato così com'è al servizio esterno
    #[serde(default)]
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
    /// Richiede l'inoltro del risultato al receiver interno (viewer webhook)
    #[serde(default)]
    pub create_webhook: bool,
    /// URL a cui inoltrare il risultato, ha precedenza su `create_webhook`
    #[serde(default)]
    pub callback_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_fields_missing() {
        let req: SubmitRequest = serde_json::from_str(r#"{"payload": {"x": 1}}"#).unwrap();
        assert_eq!(req.payload, serde_json::json!({"x": 1}));
        assert!(!req.create_webhook);
        assert!(req.callback_url.is_none());

        let req: SubmitRequest = serde_json::from_str("{}").unwrap();
        assert!(req.payload.is_null());
    }
}
