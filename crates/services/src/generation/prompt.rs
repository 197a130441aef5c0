//! Prompt templates sent to the text generator.

pub(crate) fn flashcards(text: &str) -> String {
    format!(
        "Generate 5 flashcards based on the following content. Format your response as a JSON \
         array of objects with \"question\" and \"answer\" keys. Keep questions focused and \
         concise. Keep answers brief but comprehensive. Text: {text}"
    )
}

pub(crate) fn notes(text: &str) -> String {
    format!(
        "Create concise summary notes based on the following content. Format your response as a \
         JSON array of objects with \"title\" and \"content\" keys. Break down the content into \
         3-5 main topics or concepts. Each note should be brief but informative. Text: {text}"
    )
}

pub(crate) fn quiz(text: &str, count: u32) -> String {
    format!(
        "Generate {count} multiple-choice quiz questions based on the following content. Format \
         your response as a JSON array of objects with \"question\", \"options\" (array of 4 \
         choices), and \"correctAnswer\" keys. Make sure options are distinct and only one is \
         correct. Text: {text}"
    )
}

pub(crate) fn flowchart(text: &str) -> String {
    format!(
        "Generate a Mermaid.js flowchart diagram based on the following content. Focus on \
         creating a hierarchical structure with main topics and subtopics. Format your response \
         with a JSON object containing two fields: \"title\" - a short descriptive title for the \
         flowchart (max 5 words), and \"mermaidCode\" - the complete Mermaid.js code for the \
         flowchart.

Important: For the mermaidCode, use simple \"graph TD\" syntax without any line breaks within \
node labels. Ensure each node is on its own line. Use simple syntax like:
graph TD
    A[Main Topic] --> B[Subtopic 1]
    A --> C[Subtopic 2]
    B --> D[Detail 1]
    B --> E[Detail 2]

Ensure each relationship is defined on a separate line. Do not use line breaks within node \
labels or descriptions.

Content: {text}"
    )
}
