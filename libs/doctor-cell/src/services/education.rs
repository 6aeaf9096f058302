use serde_json::{Map, Value};

use crate::models::{DoctorError, EducationHistory, EducationItem};

const UNIVERSITIES: &str = "universities";
const ORDINATOR: &str = "ordinator";
const ADVANCED_TRAINING: &str = "advanced_training";

/// Structural check of a doctor's education payload.
///
/// `universities` and `ordinator` must be present (possibly empty) lists,
/// `advanced_training` may be omitted. Every element needs a non-blank
/// `name` and string `specialty`, `start_date`, `end_date`; dates are not
/// parsed. The first violation wins, walking keys in the order above, then
/// list index, then field order.
pub fn validate_education_payload(payload: &Value) -> Result<EducationHistory, DoctorError> {
    let data = payload
        .as_object()
        .ok_or_else(|| DoctorError::malformed("history_education", "must be an object"))?;

    let universities = required_list(data, UNIVERSITIES)?;
    let ordinator = required_list(data, ORDINATOR)?;
    let advanced_training = match data.get(ADVANCED_TRAINING) {
        None => None,
        Some(value) => Some(validate_items(ADVANCED_TRAINING, value)?),
    };

    Ok(EducationHistory {
        universities,
        ordinator,
        advanced_training,
    })
}

fn required_list(data: &Map<String, Value>, key: &str) -> Result<Vec<EducationItem>, DoctorError> {
    let value = data
        .get(key)
        .ok_or_else(|| DoctorError::malformed(key, "required field is missing"))?;
    validate_items(key, value)
}

fn validate_items(key: &str, value: &Value) -> Result<Vec<EducationItem>, DoctorError> {
    let items = value
        .as_array()
        .ok_or_else(|| DoctorError::malformed(key, "must be a list"))?;

    items.iter()
        .enumerate()
        .map(|(index, item)| validate_item(key, index, item))
        .collect()
}

fn validate_item(key: &str, index: usize, item: &Value) -> Result<EducationItem, DoctorError> {
    let location = format!("{}[{}]", key, index);
    let record = item
        .as_object()
        .ok_or_else(|| DoctorError::malformed(&location, "must be an object"))?;

    let name = string_field(record, &location, "name")?;
    if name.trim().is_empty() {
        return Err(DoctorError::malformed(format!("{}.name", location), "must not be blank"));
    }

    Ok(EducationItem {
        name: name.to_string(),
        specialty: string_field(record, &location, "specialty")?.to_string(),
        start_date: string_field(record, &location, "start_date")?.to_string(),
        end_date: string_field(record, &location, "end_date")?.to_string(),
    })
}

fn string_field<'a>(
    record: &'a Map<String, Value>,
    location: &str,
    field: &str,
) -> Result<&'a str, DoctorError> {
    record
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| DoctorError::malformed(format!("{}.{}", location, field), "required string field"))
}
