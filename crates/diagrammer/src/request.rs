//! Inbound request model.
//!
//! A request arrives as a JSON string body. [`DiagramRequest::from_body`]
//! validates its shape before any server-side work happens, so every
//! failure here is a client error.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use diagrammer_core::family::Family;

use crate::error::DiagrammerError;

/// File format of the rendered artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Svg,
    Jpg,
    Pdf,
    /// Graphviz source; needs no renderer binary.
    Dot,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 5] = [
        OutputFormat::Png,
        OutputFormat::Svg,
        OutputFormat::Jpg,
        OutputFormat::Pdf,
        OutputFormat::Dot,
    ];

    /// File extension without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Svg => "svg",
            OutputFormat::Jpg => "jpg",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Dot => "dot",
        }
    }

    /// MIME type used when the artifact is uploaded.
    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Svg => "image/svg+xml",
            OutputFormat::Jpg => "image/jpeg",
            OutputFormat::Pdf => "application/pdf",
            OutputFormat::Dot => "text/vnd.graphviz",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "svg" => Ok(OutputFormat::Svg),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpg),
            "pdf" => Ok(OutputFormat::Pdf),
            "dot" | "gv" => Ok(OutputFormat::Dot),
            other => Err(format!(
                "unsupported output format `{other}`; supported formats are: png, svg, jpg, pdf, dot"
            )),
        }
    }
}

/// Entry point a request arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Generic route; the body names the family in `type`.
    Diagram,
    /// Entity-relationship route; the family is implied.
    Erd,
    /// JSON tree route; the family is implied.
    JsonTree,
}

impl Route {
    /// Family fixed by the route, if any.
    pub fn implied_family(&self) -> Option<Family> {
        match self {
            Route::Diagram => None,
            Route::Erd => Some(Family::Erd),
            Route::JsonTree => Some(Family::JsonTree),
        }
    }

    /// Status code returned on success.
    pub fn success_status(&self) -> u16 {
        match self {
            Route::Diagram => 201,
            Route::Erd | Route::JsonTree => 200,
        }
    }

    fn missing_source_message(&self) -> &'static str {
        match self {
            Route::Diagram => "missing fields 'type' and 'source' in body",
            Route::Erd => "missing field \"user_code\"",
            Route::JsonTree => "missing field \"user_code\" with the JSON document",
        }
    }
}

impl FromStr for Route {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "diagram" | "flowchart" => Ok(Route::Diagram),
            "erd" => Ok(Route::Erd),
            "json" | "json-tree" | "json_tree" => Ok(Route::JsonTree),
            other => Err(format!(
                "unknown route `{other}`; expected diagram, erd or json"
            )),
        }
    }
}

/// Wire shape of a request body.
#[derive(Debug, Deserialize)]
struct RawRequest {
    #[serde(default, alias = "user_code")]
    source: Option<String>,
    #[serde(default, rename = "type", alias = "diagram_type")]
    family: Option<String>,
    #[serde(default)]
    output_format: Option<String>,
}

/// A validated diagram request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramRequest {
    family: Family,
    source_text: String,
    output_format: OutputFormat,
}

impl DiagramRequest {
    /// Creates a request, rejecting blank source text.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `source_text` is empty after trimming.
    pub fn new(
        family: Family,
        source_text: impl Into<String>,
        output_format: OutputFormat,
    ) -> Result<Self, DiagrammerError> {
        let source_text = source_text.into();
        if source_text.trim().is_empty() {
            return Err(DiagrammerError::Validation(
                "source must not be empty".to_string(),
            ));
        }
        Ok(Self {
            family,
            source_text,
            output_format,
        })
    }

    /// Parses and validates a JSON request body received on `route`.
    ///
    /// `source` may also be sent as `user_code` and `type` as
    /// `diagram_type`. `output_format` is optional and defaults to
    /// `default_format`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a missing or malformed body, missing
    /// fields, blank source, an unsupported family or output format.
    ///
    /// # Examples
    ///
    /// ```
    /// use diagrammer::request::{DiagramRequest, OutputFormat, Route};
    /// use diagrammer_core::family::Family;
    ///
    /// let body = r#"{"type": "aws", "source": "graph = Diagram('x')"}"#;
    /// let request = DiagramRequest::from_body(Route::Diagram, Some(body), OutputFormat::Png).unwrap();
    /// assert_eq!(request.family(), Family::Aws);
    /// ```
    pub fn from_body(
        route: Route,
        body: Option<&str>,
        default_format: OutputFormat,
    ) -> Result<Self, DiagrammerError> {
        let validation = |message: String| DiagrammerError::Validation(message);

        let body = body
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| validation("request body is missing".to_string()))?;

        let value: serde_json::Value = serde_json::from_str(body)
            .map_err(|err| validation(format!("request body is not valid JSON: {err}")))?;
        if !value.is_object() {
            return Err(validation("request body must be a JSON object".to_string()));
        }
        let raw: RawRequest = serde_json::from_value(value)
            .map_err(|err| validation(format!("invalid request body: {err}")))?;

        let family = match (route.implied_family(), raw.family.as_deref()) {
            (Some(family), _) => family,
            (None, Some(name)) => name
                .parse::<Family>()
                .map_err(|err| validation(err.to_string()))?,
            (None, None) => return Err(validation(route.missing_source_message().to_string())),
        };

        let Some(source) = raw.source else {
            return Err(validation(route.missing_source_message().to_string()));
        };

        let output_format = match raw.output_format.as_deref() {
            Some(format) => format.parse::<OutputFormat>().map_err(validation)?,
            None => default_format,
        };

        Self::new(family, source, output_format)
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn parse(route: Route, body: &str) -> Result<DiagramRequest, DiagrammerError> {
        DiagramRequest::from_body(route, Some(body), OutputFormat::Png)
    }

    fn validation_message(result: Result<DiagramRequest, DiagrammerError>) -> String {
        match result {
            Err(DiagrammerError::Validation(message)) => message,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_field_aliases() {
        let request = parse(
            Route::Diagram,
            r#"{"diagram_type": "GCP", "user_code": "graph = Diagram('x')"}"#,
        )
        .unwrap();
        assert_eq!(request.family(), Family::Gcp);
        assert_eq!(request.source_text(), "graph = Diagram('x')");
        assert_eq!(request.output_format(), OutputFormat::Png);
    }

    #[test]
    fn test_route_implies_family() {
        let request = parse(Route::Erd, r#"{"user_code": "[A]"}"#).unwrap();
        assert_eq!(request.family(), Family::Erd);

        let request = parse(Route::JsonTree, r#"{"user_code": "{}", "output_format": "svg"}"#).unwrap();
        assert_eq!(request.family(), Family::JsonTree);
        assert_eq!(request.output_format(), OutputFormat::Svg);
    }

    #[test]
    fn test_generic_route_accepts_erd_and_json() {
        let request = parse(Route::Diagram, r#"{"type": "erd", "source": "[A]"}"#).unwrap();
        assert_eq!(request.family(), Family::Erd);
        let request = parse(Route::Diagram, r#"{"type": "json", "source": "[]"}"#).unwrap();
        assert_eq!(request.family(), Family::JsonTree);
    }

    #[test]
    fn test_missing_body() {
        let message = validation_message(DiagramRequest::from_body(
            Route::Diagram,
            None,
            OutputFormat::Png,
        ));
        assert_eq!(message, "request body is missing");
        assert!(matches!(
            DiagramRequest::from_body(Route::Diagram, Some("  "), OutputFormat::Png),
            Err(DiagrammerError::Validation(_))
        ));
    }

    #[test]
    fn test_malformed_bodies() {
        assert!(validation_message(parse(Route::Diagram, "{not json")).contains("not valid JSON"));
        assert_eq!(
            validation_message(parse(Route::Diagram, "[1, 2]")),
            "request body must be a JSON object"
        );
        assert!(validation_message(parse(Route::Diagram, r#"{"source": 5, "type": "aws"}"#))
            .starts_with("invalid request body"));
    }

    #[test]
    fn test_missing_fields() {
        assert_eq!(
            validation_message(parse(Route::Diagram, r#"{"source": "x"}"#)),
            "missing fields 'type' and 'source' in body"
        );
        assert_eq!(
            validation_message(parse(Route::Diagram, r#"{"type": "aws"}"#)),
            "missing fields 'type' and 'source' in body"
        );
        assert_eq!(
            validation_message(parse(Route::Erd, "{}")),
            "missing field \"user_code\""
        );
    }

    #[test]
    fn test_blank_source() {
        assert_eq!(
            validation_message(parse(Route::Diagram, r#"{"type": "aws", "source": " \n "}"#)),
            "source must not be empty"
        );
    }

    #[test]
    fn test_unsupported_family_and_format() {
        let message = validation_message(parse(Route::Diagram, r#"{"type": "oracle", "source": "x"}"#));
        assert!(message.contains("`oracle`"));

        let message = validation_message(parse(
            Route::Diagram,
            r#"{"type": "aws", "source": "x", "output_format": "bmp"}"#,
        ));
        assert!(message.contains("`bmp`"));
    }

    #[test]
    fn test_output_format_metadata() {
        assert_eq!("JPEG".parse::<OutputFormat>(), Ok(OutputFormat::Jpg));
        assert_eq!(OutputFormat::Svg.content_type(), "image/svg+xml");
        assert_eq!(OutputFormat::Dot.extension(), "dot");
        assert_eq!(Route::Diagram.success_status(), 201);
        assert_eq!(Route::Erd.success_status(), 200);
    }

    proptest! {
        #[test]
        fn test_any_body_is_accepted_or_a_validation_error(body in "\\PC{0,80}") {
            if let Err(err) = parse(Route::Diagram, &body) {
                prop_assert!(matches!(err, DiagrammerError::Validation(_)));
            }
        }

        #[test]
        fn test_source_text_is_kept_verbatim(source in "[a-zA-Z0-9 ()'=>\n]{0,60}[a-z]") {
            let body = serde_json::json!({ "type": "onprem", "source": source }).to_string();
            let request = parse(Route::Diagram, &body).unwrap();
            prop_assert_eq!(request.source_text(), source.as_str());
            prop_assert_eq!(request.family(), Family::Onprem);
        }
    }
}
