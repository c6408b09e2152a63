//! Physical table and column names
//!
//! Schema is owned by the database; these are the names this layer reads.

pub const PEOPLE: &str = "people";
pub const PEOPLE_CATEGORIES: &str = "people_categories";
pub const PEOPLE_ATTRIBUTES: &str = "people_attributes";
pub const PEOPLE_ATTRIBUTE_TYPES: &str = "people_attribute_types";
pub const PEOPLE_CATEGORY_ATTRIBUTES: &str = "people_category_attributes";
pub const PRODUCT_TYPES: &str = "product_types";
pub const PRODUCT_ATTRIBUTE_TYPES: &str = "product_attribute_types";

/// Column names, grouped loosely by the table that owns them.
pub mod columns {
    // people
    pub const PERSON_UUID: &str = "personuuid";
    pub const FIRST_NAME: &str = "firstname";
    pub const MIDDLE_NAME: &str = "middlename";
    pub const LAST_NAME: &str = "lastname";
    pub const PHONE_NUMBER: &str = "phonenumber";
    pub const PHONE_AREA: &str = "phonearea";
    pub const PHONE_COUNTRY: &str = "phonecountry";
    pub const COMPANY_NAME: &str = "companyname";
    pub const LAST_MODIFIED: &str = "lastmodified";

    // people_categories
    pub const PEOPLE_CATEGORY_ID: &str = "peoplecategoryid";
    pub const PEOPLE_CATEGORY_NAME: &str = "peoplecategoryname";

    // people_attributes / attribute types
    pub const ATTR_ID: &str = "attrid";
    pub const ATTR_NAME: &str = "attrname";
    pub const ATTR_VALUE: &str = "attrvalue";

    // product_types
    pub const PRODUCT_TYPE_ID: &str = "producttypeid";
    pub const PRODUCT_NAME: &str = "productname";
    pub const PRODUCT_UNITS: &str = "productunits";
}
