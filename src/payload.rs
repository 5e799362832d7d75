// src/payload.rs
use serde_json::{Map, Value};
use url::form_urlencoded;

use crate::error::PayloadError;

/// Query parameter the registration site puts the credentials in.
const DATA_PARAM: &str = "data";

/// Credentials as received, any of which may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialPayload {
    pub username: Option<String>,
    pub token: Option<String>,
    pub cert: Option<String>,
    pub cluster_address: Option<String>,
    pub namespace: Option<String>,
}

/// A payload with every field present and non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub token: String,
    pub cert: String,
    pub cluster_address: String,
    pub namespace: String,
}

impl CredentialPayload {
    /// Pulls the `data` parameter out of a raw query string and decodes its JSON.
    ///
    /// Fields that are absent, null, empty or not strings come back as `None`.
    pub fn parse(query: &str) -> Result<Self, PayloadError> {
        // '+' is data, not an encoded space: base64 certificates are full of them.
        let query = query.trim_start_matches('?').replace('+', "%2B");
        let data = form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == DATA_PARAM)
            .map(|(_, value)| value.into_owned())
            .ok_or_else(|| PayloadError::Malformed("missing data parameter".to_string()))?;

        let object = match serde_json::from_str::<Value>(&data) {
            Ok(Value::Object(object)) => object,
            Ok(_) => {
                return Err(PayloadError::Malformed(
                    "data is not a JSON object".to_string(),
                ))
            }
            Err(e) => return Err(PayloadError::Malformed(e.to_string())),
        };

        Ok(Self {
            username: string_field(&object, "username"),
            token: string_field(&object, "token"),
            cert: string_field(&object, "cert"),
            cluster_address: string_field(&object, "clusterAddress"),
            namespace: string_field(&object, "namespace"),
        })
    }

    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("username", &self.username),
            ("token", &self.token),
            ("cert", &self.cert),
            ("clusterAddress", &self.cluster_address),
            ("namespace", &self.namespace),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().map_or(true, str::is_empty))
        .map(|(field, _)| field)
        .collect()
    }

    pub fn validate(self) -> Result<Credentials, PayloadError> {
        let missing = self.missing_fields();
        match self {
            CredentialPayload {
                username: Some(username),
                token: Some(token),
                cert: Some(cert),
                cluster_address: Some(cluster_address),
                namespace: Some(namespace),
            } if missing.is_empty() => Ok(Credentials {
                username,
                token,
                cert,
                cluster_address,
                namespace,
            }),
            _ => Err(PayloadError::Incomplete(missing)),
        }
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(json: &str) -> String {
        form_urlencoded::Serializer::new(String::new())
            .append_pair("data", json)
            .finish()
    }

    const ALICE: &str = r#"{"username":"alice","token":"t1","cert":"c1","clusterAddress":"https://a.example:6443","namespace":"default"}"#;

    #[test]
    fn parses_and_validates_complete_payload() {
        let credentials = CredentialPayload::parse(&encode(ALICE))
            .and_then(CredentialPayload::validate)
            .unwrap();

        assert_eq!(
            credentials,
            Credentials {
                username: "alice".to_string(),
                token: "t1".to_string(),
                cert: "c1".to_string(),
                cluster_address: "https://a.example:6443".to_string(),
                namespace: "default".to_string(),
            }
        );
    }

    #[test]
    fn percent_encoded_json_is_decoded() {
        let query = "data=%7B%22username%22%3A%22alice%22%2C%22token%22%3A%22t1%22%7D";
        let payload = CredentialPayload::parse(query).unwrap();

        assert_eq!(payload.username.as_deref(), Some("alice"));
        assert_eq!(payload.token.as_deref(), Some("t1"));
        assert_eq!(payload.cert, None);
    }

    #[test]
    fn literal_plus_is_preserved() {
        let query = r#"data={"cert":"LS0t+abc/def=="}"#;
        let payload = CredentialPayload::parse(query).unwrap();

        assert_eq!(payload.cert.as_deref(), Some("LS0t+abc/def=="));
    }

    #[test]
    fn other_parameters_are_ignored() {
        let query = format!("listenPort=4000&{}&extra=1", encode(ALICE));

        assert!(CredentialPayload::parse(&query)
            .and_then(CredentialPayload::validate)
            .is_ok());
    }

    #[test]
    fn missing_data_parameter_is_malformed() {
        assert!(matches!(
            CredentialPayload::parse("foo=bar"),
            Err(PayloadError::Malformed(_))
        ));
        assert!(matches!(
            CredentialPayload::parse(""),
            Err(PayloadError::Malformed(_))
        ));
    }

    #[test]
    fn invalid_json_is_malformed() {
        assert!(matches!(
            CredentialPayload::parse(&encode("{not json")),
            Err(PayloadError::Malformed(_))
        ));
        assert!(matches!(
            CredentialPayload::parse(&encode(r#"["alice"]"#)),
            Err(PayloadError::Malformed(_))
        ));
    }

    #[test]
    fn incomplete_payload_names_missing_fields() {
        let json = r#"{"username":"alice","token":"","cert":"c1","namespace":null}"#;
        let err = CredentialPayload::parse(&encode(json))
            .and_then(CredentialPayload::validate)
            .unwrap_err();

        assert_eq!(
            err,
            PayloadError::Incomplete(vec!["token", "clusterAddress", "namespace"])
        );
        assert_eq!(
            err.to_string(),
            "Kube config is missing data: token, clusterAddress, namespace"
        );
    }

    #[test]
    fn non_string_fields_count_as_missing() {
        let json = r#"{"username":42,"token":"t","cert":"c","clusterAddress":"https://x","namespace":"ns"}"#;
        let err = CredentialPayload::parse(&encode(json))
            .and_then(CredentialPayload::validate)
            .unwrap_err();

        assert_eq!(err, PayloadError::Incomplete(vec!["username"]));
    }
}
