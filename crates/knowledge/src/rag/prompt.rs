//! Prompt construction for grounded answering.

/// What the model must say when the context does not contain the answer.
pub const INSUFFICIENT_CONTEXT_ANSWER: &str =
    "I don't have enough information in the provided documents to answer this question.";

/// Build the system instruction.
pub fn build_system_prompt(include_citations: bool) -> String {
    let mut prompt = String::from(
        "You are a helpful assistant that answers questions based strictly on the provided context.\n\n\
         Rules:\n",
    );

    prompt.push_str("1. Answer ONLY from the information in the context. Do not use prior knowledge.\n");
    prompt.push_str(&format!(
        "2. If the context does not contain the answer, say: \"{}\"\n",
        INSUFFICIENT_CONTEXT_ANSWER
    ));
    prompt.push_str("3. Be concise and direct.\n");
    prompt.push_str(
        "4. If the context is ambiguous or contradictory, acknowledge it in your answer.\n",
    );

    if include_citations {
        prompt.push_str(
            "5. Cite the sources you rely on using their labels, for example [Source 1].\n",
        );
        prompt.push_str("6. Never speculate beyond what the context states.\n");
    } else {
        prompt.push_str("5. Never speculate beyond what the context states.\n");
    }

    prompt
}

/// Build the user turn carrying context and question.
pub fn build_user_prompt(context: &str, question: &str) -> String {
    format!(
        "Context:\n{}\n\nQuestion: {}\n\nPlease provide a clear, accurate answer based solely on the context above.",
        context, question
    )
}
