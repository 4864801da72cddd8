use crate::bills::BillRecord;

/// System-role instruction sent with every completion request.
pub const SYSTEM_PROMPT: &str = "Ты помощник, который объясняет российские законопроекты простым языком. \
Отвечай только на основе переданных материалов: номера, ссылки, названия и описания законопроекта. \
Не придумывай факты, даты, суммы и статьи, которых нет в материалах. \
Если данных недостаточно, честно скажи об этом и предложи открыть карточку законопроекта по ссылке.";

const INSTRUCTIONS: &str = "Объясни этот законопроект простыми словами, как другу:\n\
1. Что он меняет в одном-двух предложениях.\n\
2. Кого это коснётся и как изменится обычная жизнь, с примерами из реальной жизни.\n\
3. Немного юмора уместно, но без насмешек над людьми.\n\
Пиши коротко, без канцелярита, не больше 1500 символов.";

/// Build the user-role prompt for one bill.
///
/// Title and description sections are included only when the record has them.
pub fn build_prompt(number: &str, url: &str, record: Option<&BillRecord>) -> String {
    let mut prompt = format!("Законопроект № {}\nСсылка: {}\n", number, url);

    if let Some(record) = record {
        if !record.title.is_empty() {
            prompt.push_str(&format!("\nНазвание:\n{}\n", record.title));
        }
        if !record.description.is_empty() {
            prompt.push_str(&format!("\nОписание:\n{}\n", record.description));
        }
    }

    prompt.push('\n');
    prompt.push_str(INSTRUCTIONS);
    prompt
}
