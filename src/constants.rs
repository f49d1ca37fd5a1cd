// Normalized input column identifiers (post trim + lowercase).
pub const COL_PATIENT_ID: &str = "patientid";
pub const COL_DOCTOR_NAME: &str = "doctorname";
pub const COL_MEDICINE_NAME: &str = "medicinename";
pub const COL_DOSAGE: &str = "dosage";
pub const COL_FREQUENCY: &str = "frequency";
pub const COL_DATE: &str = "date";
pub const COL_DIAGNOSIS: &str = "diagnosis";
pub const COL_NOTES: &str = "notes";
pub const COL_PRICE: &str = "price";

/// Columns a row must carry a value for to be admitted at all.
pub const REQUIRED_COLUMNS: [&str; 4] = [
    COL_PATIENT_ID,
    COL_MEDICINE_NAME,
    COL_DOCTOR_NAME,
    COL_DATE,
];

/// Header of the cleaned CSV artifact, in persisted column order.
pub const CANONICAL_COLUMNS: [&str; 9] = [
    COL_PATIENT_ID,
    COL_DOCTOR_NAME,
    COL_MEDICINE_NAME,
    COL_DOSAGE,
    COL_FREQUENCY,
    COL_DATE,
    COL_DIAGNOSIS,
    COL_NOTES,
    COL_PRICE,
];

/// Date formats accepted by the normalizer, tried in order.
pub const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%m-%d-%Y"];
