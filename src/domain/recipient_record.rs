/// One spreadsheet row. The address is kept as raw cell text; it is only
/// validated when the row is dispatched, so a bad address fails that row alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientRecord {
    pub name: String,
    pub email: String,
    pub company: String,
}
