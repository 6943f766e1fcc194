//! Prompt templates for answer synthesis.

/// Prompt for the first context block.
pub(crate) fn question_answer(context: &str, question: &str) -> String {
    format!(
        "Context information from the document is below.\n\
         ---------------------\n\
         {context}\n\
         ---------------------\n\
         Using only the context information and no prior knowledge, answer the question.\n\
         Question: {question}\n\
         Answer: "
    )
}

/// Prompt for each further context block, refining the running answer.
pub(crate) fn refine(context: &str, question: &str, existing_answer: &str) -> String {
    format!(
        "The question is: {question}\n\
         An existing answer is: {existing_answer}\n\
         Refine the existing answer only if the additional context below improves it.\n\
         ---------------------\n\
         {context}\n\
         ---------------------\n\
         If the context is not useful, repeat the existing answer unchanged.\n\
         Refined answer: "
    )
}

/// Greedily pack `texts` into as few blocks as fit within `budget` characters.
///
/// Texts inside a block are separated by a blank line. A text longer than the budget is cut
/// into budget-sized pieces on character boundaries.
pub(crate) fn pack_context(texts: &[String], budget: usize) -> Vec<String> {
    const SEPARATOR: &str = "\n\n";
    let budget = budget.max(1);
    let mut blocks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;

    for piece in texts.iter().flat_map(|text| split_to_budget(text, budget)) {
        let piece_chars = piece.chars().count();
        let needed = if current.is_empty() {
            piece_chars
        } else {
            current_chars + SEPARATOR.len() + piece_chars
        };
        if needed > budget && !current.is_empty() {
            blocks.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        if !current.is_empty() {
            current.push_str(SEPARATOR);
            current_chars += SEPARATOR.len();
        }
        current.push_str(piece);
        current_chars += piece_chars;
    }

    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

fn split_to_budget(text: &str, budget: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut rest = text;
    while rest.chars().count() > budget {
        let cut = rest
            .char_indices()
            .nth(budget)
            .map(|(offset, _)| offset)
            .unwrap_or(rest.len());
        pieces.push(&rest[..cut]);
        rest = &rest[cut..];
    }
    if !rest.is_empty() {
        pieces.push(rest);
    }
    pieces
}
