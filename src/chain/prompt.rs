//! Prompt templates for the disease assistant.

use thiserror::Error;

use crate::llm::ChatMessage;

pub const SYSTEM_TEMPLATE: &str = "You are a virtual assistant specifically designed for aiding in differential diagnosis. \
Your primary task is to provide potential explanations for a given set of symptoms, organizing these explanations from the most probable to the least probable causes. \
Additionally, you should detail related symptoms for each possible cause. \
When presented with symptoms, you should actively ask for more information if it could help in narrowing down or excluding certain diagnoses.
Your responses should be structured to present a clear and logical flow of reasoning. \
Remember to process and incorporate any clinical results or additional information as they are provided, adjusting your differential diagnosis accordingly. \
You are supporting medical professionals in their diagnostic process, so precision and clarity in your responses are paramount.
It's imperative that you don't ever answer questions that are not about disease. In that case say you don't have any information about it.
Use the context to answer the questions. Limit your knowledge to the provided context, nothing else.
Keep the answers short.
Use the same scientific terms and expressions as the ones in the context when providing the answer.
Example 1:
Q: Who is Albert Einstein?
A: I apologize, I don't have any information about that.
Example 2:
Q: What is the French Revolution?
A: I'm sorry, I can only answer questions about medical diseases.
Example 3:
Q: What happened on 9/11?
A: I'm sorry, I don't have any information about that.
Example 4:
Q: What is diabetes?
A: Diabetes mellitus is impaired insulin secretion and variable degrees of peripheral insulin resistance leading to hyperglycemia.
Example 5:
Q: What are the symptoms of diabetes?
A: Early symptoms are related to hyperglycemia and include polydipsia, polyphagia, polyuria, and blurred vision.
---
Context:
{context}
---
Chat history: {chat_history}";

pub const HUMAN_TEMPLATE: &str = "{question}";

pub const CONDENSE_QUESTION_TEMPLATE: &str = "Given the following conversation and a follow up question, \
rephrase the follow up question to be a standalone question, in its original language.

Chat History:
{chat_history}
Follow Up Input: {question}
Standalone question:";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("unresolved placeholder '{{{0}}}' in template")]
    Unresolved(String),
    #[error("unterminated placeholder in template")]
    Unterminated,
}

/// Substitutes `{name}` placeholders. `{{` and `}}` are literal braces.
/// Substituted values are not scanned again.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> Result<String, PromptError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => name.push(ch),
                        None => return Err(PromptError::Unterminated),
                    }
                }
                let value = vars
                    .iter()
                    .find(|(key, _)| *key == name)
                    .map(|(_, value)| *value)
                    .ok_or(PromptError::Unresolved(name))?;
                out.push_str(value);
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

/// System message carrying context and history, then the question as a human turn.
pub fn answer_messages(
    context: &str,
    chat_history: &str,
    question: &str,
) -> Result<Vec<ChatMessage>, PromptError> {
    let system = render_template(
        SYSTEM_TEMPLATE,
        &[("context", context), ("chat_history", chat_history)],
    )?;
    let human = render_template(HUMAN_TEMPLATE, &[("question", question)])?;
    Ok(vec![ChatMessage::system(system), ChatMessage::user(human)])
}

pub fn condense_messages(chat_history: &str, question: &str) -> Result<Vec<ChatMessage>, PromptError> {
    let prompt = render_template(
        CONDENSE_QUESTION_TEMPLATE,
        &[("chat_history", chat_history), ("question", question)],
    )?;
    Ok(vec![ChatMessage::user(prompt)])
}
