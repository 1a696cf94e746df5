use crate::domain::RecipientRecord;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("template references unknown placeholder {{{0}}}, only {{name}} and {{company}} are available")]
    UnknownPlaceholder(String),
    #[error("template has an unbalanced '{brace}' at byte {position}")]
    UnbalancedBrace { brace: char, position: usize },
}

/// Substitutes `{name}` and `{company}` in `template`.
///
/// `{{` and `}}` produce literal braces. Any other placeholder is an error so
/// a typo in the template never reaches a recipient half-rendered.
pub fn render(record: &RecipientRecord, template: &str) -> Result<String, RenderError> {
    let mut body = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((position, c)) = chars.next() {
        match c {
            '{' if chars.next_if(|&(_, next)| next == '{').is_some() => body.push('{'),
            '{' => {
                let mut key = String::new();
                loop {
                    match chars.next() {
                        Some((_, '}')) => break,
                        Some((_, '{')) | None => {
                            return Err(RenderError::UnbalancedBrace {
                                brace: '{',
                                position,
                            });
                        }
                        Some((_, k)) => key.push(k),
                    }
                }
                match key.as_str() {
                    "name" => body.push_str(&record.name),
                    "company" => body.push_str(&record.company),
                    _ => return Err(RenderError::UnknownPlaceholder(key)),
                }
            }
            '}' if chars.next_if(|&(_, next)| next == '}').is_some() => body.push('}'),
            '}' => return Err(RenderError::UnbalancedBrace { brace: '}', position }),
            _ => body.push(c),
        }
    }

    Ok(body)
}
