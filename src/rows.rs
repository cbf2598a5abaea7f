/// Largest value a signed 32-bit column can hold.
pub const I32_MAX: i128 = 2_147_483_647;
const U32_WRAP: i128 = 4_294_967_296;

/// Rewrites integer fields above `i32::MAX` as their two's-complement signed
/// value. Returns the rewritten row and how many fields changed.
///
/// Non-integer fields, and integers that fit, keep their original text.
pub fn convert_unsigned(row: &str) -> (String, usize) {
    let mut converted = 0;
    let fields: Vec<String> = row
        .split(',')
        .map(|field| match field.trim().parse::<i128>() {
            Ok(value) if value > I32_MAX => {
                converted += 1;
                (value - U32_WRAP).to_string()
            }
            _ => field.to_string(),
        })
        .collect();
    (fields.join(","), converted)
}

/// Accumulates the data rows of one block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowCollector {
    convert_unsigned: bool,
    rows: Vec<String>,
    converted: usize,
}

impl RowCollector {
    pub fn new(convert_unsigned: bool) -> Self {
        Self {
            convert_unsigned,
            ..Self::default()
        }
    }

    pub fn push(&mut self, line: &str) {
        let line = line.trim_end();
        if self.convert_unsigned {
            let (row, count) = convert_unsigned(line);
            self.converted += count;
            self.rows.push(row);
        } else {
            self.rows.push(line.to_string());
        }
    }

    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Fields rewritten by unsigned conversion so far.
    pub fn converted(&self) -> usize {
        self.converted
    }
}
