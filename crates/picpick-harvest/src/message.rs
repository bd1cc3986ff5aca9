//! Messages exchanged between the scanning context and its consumers

use crate::error::ScanError;
use picpick_resource::{ImgList, Selector};
use serde::{Deserialize, Serialize};

/// Scan protocol messages, serialized as JSON objects tagged by `command`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command")]
pub enum ContentMessage {
    /// Ask for an immediate scan
    #[serde(rename = "requestImgList")]
    RequestImgList,

    /// Result of one scan: records without payloads, keyed by URI
    #[serde(rename = "putImgList")]
    PutImgList {
        url: String,
        imglist: ImgList,
        /// In-process sequence number of the scan
        #[serde(skip)]
        scan_id: u64,
    },

    /// Highlight the node behind a previously issued selector
    #[serde(rename = "selectDOMElement")]
    SelectDomElement { selector: Selector },
}

impl ContentMessage {
    /// Encode as JSON
    ///
    /// # Errors
    /// Returns error if a record fails to serialize
    pub fn to_json(&self) -> Result<String, ScanError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from JSON
    ///
    /// # Errors
    /// Returns `ScanError::Malformed` for unknown commands or bad fields
    pub fn from_json(text: &str) -> Result<Self, ScanError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use picpick_resource::{ResourceKey, ResourceRecord};
    use pretty_assertions::assert_eq;

    #[test]
    fn commands_use_wire_names() {
        assert_eq!(
            ContentMessage::RequestImgList.to_json().unwrap(),
            r#"{"command":"requestImgList"}"#
        );
        let select = ContentMessage::from_json(r#"{"command":"selectDOMElement","selector":".picpickdl-1"}"#).unwrap();
        assert_eq!(
            select,
            ContentMessage::SelectDomElement {
                selector: Selector::parse(".picpickdl-1").unwrap()
            }
        );
    }

    #[test]
    fn put_img_list_omits_payload_and_scan_id() {
        let key = ResourceKey::new("https://example.com/a.png");
        let mut imglist = ImgList::new();
        imglist.insert(
            key.clone(),
            ResourceRecord::new(key, "a.png", Selector::from_marker("picpickdl1"), "html>body>img>img"),
        );
        let message = ContentMessage::PutImgList {
            url: "https://example.com/".to_string(),
            imglist,
            scan_id: 7,
        };
        let json: serde_json::Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();
        assert_eq!(json["command"], "putImgList");
        let record = &json["imglist"]["https://example.com/a.png"];
        assert_eq!(record["filename"], "a.png");
        assert_eq!(record["selector"], ".picpickdl1");
        assert!(record.get("payload").is_none());
        assert!(json.get("scan_id").is_none());
    }

    #[test]
    fn malformed_selectors_are_rejected() {
        for selector in ["", ".", "img", ".a > .b"] {
            let text = format!(r#"{{"command":"selectDOMElement","selector":"{selector}"}}"#);
            assert!(
                matches!(ContentMessage::from_json(&text), Err(ScanError::Malformed(_))),
                "{selector:?} accepted"
            );
        }
    }

    #[test]
    fn unknown_command_is_malformed() {
        assert!(matches!(
            ContentMessage::from_json(r#"{"command":"explode"}"#),
            Err(ScanError::Malformed(_))
        ));
    }
}
