//! Prompt texts for the outline and subchapter requests.

use crate::contract::Prompt;

pub fn outline_prompt(book_title: &str) -> Prompt {
    Prompt::new(
        format!(
            "Generate a list of chapters and subchapters for a book titled '{book_title}' in JSON format. \
             Do not include any explanation or code formatting. \
             Format it in this way: {{\"chapter_name\":[\"subchapter_names\"],}}. \
             Please include between 5 and 10 subchapters per chapter. Use this format exactly."
        ),
        "Generate with 4 space indents",
    )
}

pub fn subchapter_prompt(chapter: &str, subchapter: &str, book_title: &str) -> Prompt {
    Prompt::new(
        format!(
            "Generate the content for a subchapter in a book. \
             The chapter title is '{chapter}'. \
             The title of the subchapter is '{subchapter}'. \
             The title of the book is '{book_title}'. \
             Please only include the requested data."
        ),
        "Do not include the chapter title, the subchapter title, or the book title in the data, \
         only the chapter content.",
    )
}
