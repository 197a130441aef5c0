use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::ids::ItemId;
use crate::model::text::{TextError, non_blank};

/// A generated diagram: Mermaid source plus the text it was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowchartData {
    id: ItemId,
    title: String,
    mermaid_code: String,
    content: String,
    created_at: DateTime<Utc>,
}

impl FlowchartData {
    /// # Errors
    ///
    /// Returns `TextError` if the title or diagram source is blank.
    pub fn new(
        id: ItemId,
        title: impl Into<String>,
        mermaid_code: impl Into<String>,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, TextError> {
        Ok(Self {
            id,
            title: non_blank("title", title)?,
            mermaid_code: non_blank("mermaidCode", mermaid_code)?,
            content: content.into(),
            created_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> &ItemId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn mermaid_code(&self) -> &str {
        &self.mermaid_code
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn blank_diagram_is_rejected() {
        let err = FlowchartData::new(
            ItemId::synthesize_single("flowchart", fixed_now()),
            "Photosynthesis",
            "\n",
            "source",
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, TextError::Empty { field: "mermaidCode" });
    }
}
