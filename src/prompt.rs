//! The request sent to the model.

use chrono::NaiveDate;

const PROMPT_TEMPLATE: &str = "
Provide me a title for a blog post about something that happened on {date} in the past.
Then give me SEO tags for the blog post.
Then provide me an seo friendly url slug.
Then write me a blog post with over {word_count} words about the same event using professional language.
Do not include media.
Provide this information for me in json.
";

/// Build the prompt for `today`, e.g. "... happened on Oct 17 in the past."
pub fn build_prompt(today: NaiveDate, word_count: u32) -> String {
    PROMPT_TEMPLATE
        .replace("{date}", &today.format("%b %d").to_string())
        .replace("{word_count}", &word_count.to_string())
}
