//! Prompt builders for the completion provider.
//!
//! Each builder returns a `(system, user)` pair. The two conversational
//! flows that chain continuation tokens (context question, context
//! extraction) instruct the provider to answer with a bare JSON object whose
//! shape the router parses; the narrative builders ask for plain text.

use crate::entities::{report, transaction, user};

/// Sampling temperature for proactive context questions.
pub const QUESTION_TEMPERATURE: f32 = 0.7;
/// Sampling temperature for context extraction.
pub const EXTRACTION_TEMPERATURE: f32 = 0.3;
/// Sampling temperature for short-report narratives.
pub const REPORT_TEMPERATURE: f32 = 0.2;
/// Sampling temperature for life-report narratives.
pub const LIFE_TEMPERATURE: f32 = 0.1;
/// Sampling temperature for general-assistant replies.
pub const GENERAL_TEMPERATURE: f32 = 0.5;

fn format_date(date: &chrono::DateTime<chrono::Utc>) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn history_line(transaction: &transaction::Model) -> String {
    let context = transaction
        .context
        .as_deref()
        .map(|c| format!(" (Context: {c})"))
        .unwrap_or_default();
    format!(
        "- {:.2} for {} at {} on {}{context}",
        transaction.amount,
        transaction.category.as_str(),
        transaction.store_name.as_deref().unwrap_or("Unknown"),
        format_date(&transaction.date)
    )
}

fn history_block(transactions: &[transaction::Model]) -> String {
    if transactions.is_empty() {
        "None found".to_string()
    } else {
        transactions
            .iter()
            .map(history_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Prompts for the proactive context question after a DEBIT transaction.
#[must_use]
pub fn context_question(
    transaction: &transaction::Model,
    user: &user::Model,
    category_history: &[transaction::Model],
    store_history: &[transaction::Model],
    recent_history: &[transaction::Model],
) -> (String, String) {
    let system = "You are a friendly AI banking assistant. Your goal is to gather context \
about WHY and HOW the user made this transaction to better understand their spending patterns.

Guidelines:
- Be friendly, curious, and conversational
- Ask about the purpose, occasion, or reason behind the transaction
- Compare with the user's spending history to create personalized insights
- Generate options that help uncover the story behind the purchase
- Keep every option at most 20 characters

Return a bare JSON object in exactly this format, with no markdown fences:
{
  \"content\": \"A friendly, conversational message with insights based on spending patterns\",
  \"options\": [\"Option 1\", \"Option 2\", \"Option 3\"]
}
The options array must contain 2 to 4 contextual reply options."
        .to_string();

    let store_block = match transaction.store_name.as_deref() {
        Some(store) => format!(
            "\nRecent transactions at {store}:\n{}\n",
            history_block(store_history)
        ),
        None => String::new(),
    };

    let user_prompt = format!(
        "User just made a transaction:\n\
         - Amount: {:.2}\n\
         - Category: {}\n\
         - Store: {}\n\
         - Current balance: {:.2}\n\n\
         Recent transactions in the same category ({}):\n{}\n\
         {store_block}\n\
         Recent overall transactions:\n{}\n\n\
         Generate a friendly message with context questions for this transaction.",
        transaction.amount,
        transaction.category.as_str(),
        transaction.store_name.as_deref().unwrap_or("Not specified"),
        user.balance,
        transaction.category.as_str(),
        history_block(category_history),
        history_block(recent_history),
    );

    (system, user_prompt)
}

/// Prompts for extracting context from an inbound message on an open
/// transaction conversation.
#[must_use]
pub fn context_extraction(
    transaction: &transaction::Model,
    user_message: &str,
) -> (String, String) {
    let system = "You are a financial AI assistant analyzing a user's message about their \
transaction to extract context and determine next steps.

Your task is to:
1. Determine if the message is related to the transaction
2. Extract meaningful context from the user's message, close to their wording but a bit more detailed
3. Decide if you need more information or if the conversation can be closed
4. Provide an appropriate response

Guidelines:
- Plain text only, no markdown
- Extract specific context like purpose, category details, business or personal nature
- Ask for more info if the context is vague or incomplete
- Close the conversation once you have sufficient context

Return a bare JSON object in exactly this format, with no markdown fences:
{
  \"isRelated\": true,
  \"needFurtherInfo\": false,
  \"context\": \"Extracted context from the user message\",
  \"response\": {
    \"content\": \"Your response message\",
    \"options\": [\"Optional reply choice\"]
  }
}"
    .to_string();

    let user_prompt = format!(
        "Transaction details:\n\
         - Amount: {:.2}\n\
         - Category: {}\n\
         - Store: {}\n\
         - Date: {}\n\
         - Previous context: {}\n\n\
         User's message: \"{user_message}\"\n\n\
         Extract context and determine if more information is needed.",
        transaction.amount,
        transaction.category.as_str(),
        transaction.store_name.as_deref().unwrap_or("Not specified"),
        format_date(&transaction.date),
        transaction.context.as_deref().unwrap_or("None"),
    );

    (system, user_prompt)
}

/// Prompts for the best-effort narrative on a freshly created SHORT report.
#[must_use]
pub fn report_narrative(
    report: &report::Model,
    user: &user::Model,
    transactions: &[transaction::Model],
) -> (String, String) {
    let system = "You are a financial AI assistant analyzing a user's spending report to \
provide insights and context.

Guidelines:
- Plain text only, no markdown
- Be encouraging and supportive
- Focus on actionable insights
- Highlight both positive behaviors and areas for improvement
- Use specific numbers and percentages when relevant
- Keep the tone friendly and conversational"
        .to_string();

    let details = history_block(transactions);

    let user_prompt = format!(
        "User's spending report:\n\n\
         Report period: {} to {}\n\
         Total transactions: {}\n\
         Total amount: {:.2}\n\
         Credit amount: {:.2}\n\
         Debit amount: {:.2}\n\
         Current balance: {:.2}\n\n\
         Category breakdown:\n{}\n\n\
         Transaction details:\n{details}\n\n\
         Provide an analysis with insights, patterns, and actionable advice for this \
         user's spending behavior.",
        format_date(&report.period_from),
        format_date(&report.period_to),
        report.total_transactions,
        report.total_amount,
        report.credit_amount,
        report.debit_amount,
        user.balance,
        report.category_breakdown,
    );

    (system, user_prompt)
}

fn short_report_line(index: usize, report: &report::Model) -> String {
    let context = report
        .context
        .as_deref()
        .map(|c| c.chars().take(200).collect::<String>())
        .unwrap_or_else(|| "No context available".to_string());
    format!(
        "Report {} ({} - {}): total {:.2} over {} transactions, credit {:.2}, debit {:.2}, \
         breakdown {}, context: {context}",
        index + 1,
        format_date(&report.period_from),
        format_date(&report.period_to),
        report.total_amount,
        report.total_transactions,
        report.credit_amount,
        report.debit_amount,
        report.category_breakdown,
    )
}

/// Prompts for the running LIFE-report narrative, supported by the most
/// recent SHORT reports.
#[must_use]
pub fn life_narrative(
    life_report: &report::Model,
    recent_short_reports: &[report::Model],
) -> (String, String) {
    let system = "You are a financial AI assistant analyzing a user's comprehensive life \
report based on their spending history and patterns.

Guidelines:
- Plain text only, no markdown
- Focus on trends and patterns rather than individual transactions
- Provide strategic, long-term financial advice
- Be encouraging about positive trends and constructive about areas for improvement
- Keep the tone supportive and forward-looking"
        .to_string();

    let shorts = recent_short_reports
        .iter()
        .enumerate()
        .map(|(i, r)| short_report_line(i, r))
        .collect::<Vec<_>>()
        .join("\n");

    let user_prompt = format!(
        "Current life report summary:\n\
         - Period: {} to {}\n\
         - Total transactions: {}\n\
         - Total amount: {:.2}\n\
         - Credit amount: {:.2}\n\
         - Debit amount: {:.2}\n\
         - Category breakdown: {}\n\n\
         Previous short reports:\n{shorts}\n\n\
         Provide a life report analysis covering long-term trends, behavior changes over \
         time, category spending evolution, and strategic recommendations.",
        format_date(&life_report.period_from),
        format_date(&life_report.period_to),
        life_report.total_transactions,
        life_report.total_amount,
        life_report.credit_amount,
        life_report.debit_amount,
        life_report.category_breakdown,
    );

    (system, user_prompt)
}

/// Prompts for a general-assistant turn, grounded in the user's reports.
#[must_use]
pub fn general_assistant(
    user: &user::Model,
    life_report: Option<&report::Model>,
    recent_short_reports: &[report::Model],
    user_message: &str,
) -> (String, String) {
    let system = "You are a friendly AI financial assistant helping users with their banking \
and financial questions.

Guidelines:
- Plain text only, no markdown
- Be friendly and conversational
- Provide specific insights based on the user's actual spending data
- Offer actionable advice when appropriate
- If you don't have enough context, ask clarifying questions
- Keep responses concise, at most 300 words"
        .to_string();

    let mut context_info = format!(
        "User info:\n- Name: {}\n- Balance: {:.2}\n",
        user.name, user.balance
    );

    if let Some(life) = life_report {
        context_info.push_str(&format!(
            "\nLife report summary:\n\
             - Period: {} to {}\n\
             - Total transactions: {}\n\
             - Total amount: {:.2}\n\
             - Credit: {:.2}, Debit: {:.2}\n\
             - Category breakdown: {}\n\
             - Analysis: {}\n",
            format_date(&life.period_from),
            format_date(&life.period_to),
            life.total_transactions,
            life.total_amount,
            life.credit_amount,
            life.debit_amount,
            life.category_breakdown,
            life.context
                .as_deref()
                .map(|c| c.chars().take(300).collect::<String>())
                .unwrap_or_else(|| "No analysis available".to_string()),
        ));
    }

    if !recent_short_reports.is_empty() {
        context_info.push_str("\nRecent short reports:\n");
        for (i, report) in recent_short_reports.iter().enumerate() {
            context_info.push_str(&short_report_line(i, report));
            context_info.push('\n');
        }
    }

    let user_prompt = format!(
        "User's financial context:\n{context_info}\n\
         User's message: \"{user_message}\"\n\n\
         Provide a helpful response based on their financial context and message. If they \
         ask about their spending, use the actual data from their reports.",
    );

    (system, user_prompt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_context_question_includes_history_and_contract() {
        let user = sample_user(1);
        let subject = sample_transaction(10, 1, -45.0, "Pizza Palace");
        let history = vec![sample_transaction(9, 1, -38.0, "Pizza Palace")];

        let (system, prompt) = context_question(&subject, &user, &history, &history, &history);
        assert!(system.contains("\"options\""));
        assert!(prompt.contains("Pizza Palace"));
        assert!(prompt.contains("-45.00"));
        assert!(prompt.contains("-38.00"));
    }

    #[test]
    fn test_context_question_without_store() {
        let user = sample_user(1);
        let mut subject = sample_transaction(10, 1, -45.0, "Pizza Palace");
        subject.store_name = None;

        let (_, prompt) = context_question(&subject, &user, &[], &[], &[]);
        assert!(prompt.contains("Store: Not specified"));
        assert!(!prompt.contains("Recent transactions at"));
        assert!(prompt.contains("None found"));
    }

    #[test]
    fn test_context_extraction_carries_previous_context() {
        let mut subject = sample_transaction(10, 1, -45.0, "Pizza Palace");
        subject.context = Some("dinner with family".to_string());

        let (system, prompt) = context_extraction(&subject, "it was a birthday");
        assert!(system.contains("isRelated"));
        assert!(system.contains("needFurtherInfo"));
        assert!(prompt.contains("dinner with family"));
        assert!(prompt.contains("it was a birthday"));
    }

    #[test]
    fn test_general_assistant_without_reports() {
        let user = sample_user(1);
        let (_, prompt) = general_assistant(&user, None, &[], "how am I doing?");
        assert!(prompt.contains("how am I doing?"));
        assert!(!prompt.contains("Life report summary"));
        assert!(!prompt.contains("Recent short reports"));
    }
}
