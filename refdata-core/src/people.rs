//! People by category
//!
//! Two reads per call:
//! - people joined to their category, filtered by category name
//! - attribute values for that category, joined through the attribute type
//!   and category-attribute tables
//!
//! Attribute rows are indexed by person once, then folded into the optional
//! fields of each [`Person`].

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::Result;
use crate::executor::{decode_records, Executor};
use crate::query::{Column, Query};
use crate::tables::{self, columns};

/// Person row from `people` joined with `people_categories`
///
/// `peoplecategoryname` is the equality filter of the query, so it is never
/// NULL in a returned row. Every `people` text column may be.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PersonRow {
    pub personuuid: Uuid,
    pub peoplecategoryid: i32,
    pub peoplecategoryname: String,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub middlename: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default)]
    pub phonenumber: Option<String>,
    #[serde(default)]
    pub phonearea: Option<String>,
    #[serde(default)]
    pub phonecountry: Option<String>,
    #[serde(default)]
    pub companyname: Option<String>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub lastmodified: Option<DateTime<Utc>>,
}

/// `timestamptz` arrives as RFC 3339; plain `timestamp` has no offset and is
/// read as UTC.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.and_utc())
        })
        .ok()
}

fn deserialize_timestamp<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    parse_timestamp(&raw)
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", raw)))
}

/// Attribute value row (`personuuid`, `attrname`, `attrvalue`)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PersonAttributeRow {
    pub personuuid: Uuid,
    pub attrname: String,
    #[serde(default)]
    pub attrvalue: Option<String>,
}

/// Dynamic attribute names that map onto [`Person`] fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersonAttribute {
    Notes,
    PaymentFrequency,
    Username,
}

impl PersonAttribute {
    pub const ALL: [Self; 3] = [Self::Notes, Self::PaymentFrequency, Self::Username];

    /// Parse an `attrname`. Matching is exact and case-sensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "notes" => Some(Self::Notes),
            "paymentFrequency" => Some(Self::PaymentFrequency),
            "username" => Some(Self::Username),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Notes => "notes",
            Self::PaymentFrequency => "paymentFrequency",
            Self::Username => "username",
        }
    }
}

/// Person as returned to API consumers.
///
/// Dynamic attributes are omitted from serialized output when the person has
/// no row for them. Fixed columns serialize as `null` when the database holds
/// NULL; `lastModified` is RFC 3339 in UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub uuid: Uuid,
    pub people_category: String,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub phone_area: Option<String>,
    pub phone_country: Option<String>,
    pub company_name: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_frequency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Person {
    fn from_row(row: PersonRow) -> Self {
        Self {
            uuid: row.personuuid,
            people_category: row.peoplecategoryname,
            first_name: row.firstname,
            middle_name: row.middlename,
            last_name: row.lastname,
            phone_number: row.phonenumber,
            phone_area: row.phonearea,
            phone_country: row.phonecountry,
            company_name: row.companyname,
            last_modified: row.lastmodified,
            username: None,
            payment_frequency: None,
            notes: None,
        }
    }

    /// Value of a dynamic attribute, if set
    pub fn attribute(&self, attribute: PersonAttribute) -> Option<&str> {
        match attribute {
            PersonAttribute::Notes => self.notes.as_deref(),
            PersonAttribute::PaymentFrequency => self.payment_frequency.as_deref(),
            PersonAttribute::Username => self.username.as_deref(),
        }
    }

    fn set_attribute(&mut self, attribute: PersonAttribute, value: Option<String>) {
        let slot = match attribute {
            PersonAttribute::Notes => &mut self.notes,
            PersonAttribute::PaymentFrequency => &mut self.payment_frequency,
            PersonAttribute::Username => &mut self.username,
        };
        *slot = value;
    }
}

/// All people in `category`, joined to their category row.
pub fn people_query(category: &str) -> Query {
    Query::from_table(tables::PEOPLE)
        .select([
            Column::new(tables::PEOPLE, columns::PERSON_UUID),
            Column::new(tables::PEOPLE, columns::PEOPLE_CATEGORY_ID),
            Column::new(tables::PEOPLE_CATEGORIES, columns::PEOPLE_CATEGORY_NAME),
            Column::new(tables::PEOPLE, columns::FIRST_NAME),
            Column::new(tables::PEOPLE, columns::MIDDLE_NAME),
            Column::new(tables::PEOPLE, columns::LAST_NAME),
            Column::new(tables::PEOPLE, columns::PHONE_NUMBER),
            Column::new(tables::PEOPLE, columns::PHONE_AREA),
            Column::new(tables::PEOPLE, columns::PHONE_COUNTRY),
            Column::new(tables::PEOPLE, columns::COMPANY_NAME),
            Column::new(tables::PEOPLE, columns::LAST_MODIFIED),
        ])
        .inner_join(
            tables::PEOPLE_CATEGORIES,
            Column::new(tables::PEOPLE, columns::PEOPLE_CATEGORY_ID),
            Column::new(tables::PEOPLE_CATEGORIES, columns::PEOPLE_CATEGORY_ID),
        )
        .where_eq(
            Column::new(tables::PEOPLE_CATEGORIES, columns::PEOPLE_CATEGORY_NAME),
            category,
        )
}

/// Attribute values for every attribute type attached to `category`.
pub fn attribute_values_query(category: &str) -> Query {
    Query::from_table(tables::PEOPLE_ATTRIBUTES)
        .select([
            Column::new(tables::PEOPLE_ATTRIBUTES, columns::PERSON_UUID),
            Column::new(tables::PEOPLE_ATTRIBUTE_TYPES, columns::ATTR_NAME),
            Column::new(tables::PEOPLE_ATTRIBUTES, columns::ATTR_VALUE),
        ])
        .inner_join(
            tables::PEOPLE_ATTRIBUTE_TYPES,
            Column::new(tables::PEOPLE_ATTRIBUTES, columns::ATTR_ID),
            Column::new(tables::PEOPLE_ATTRIBUTE_TYPES, columns::ATTR_ID),
        )
        .inner_join(
            tables::PEOPLE_CATEGORY_ATTRIBUTES,
            Column::new(tables::PEOPLE_ATTRIBUTE_TYPES, columns::ATTR_ID),
            Column::new(tables::PEOPLE_CATEGORY_ATTRIBUTES, columns::ATTR_ID),
        )
        .inner_join(
            tables::PEOPLE_CATEGORIES,
            Column::new(tables::PEOPLE_CATEGORIES, columns::PEOPLE_CATEGORY_ID),
            Column::new(tables::PEOPLE_CATEGORY_ATTRIBUTES, columns::PEOPLE_CATEGORY_ID),
        )
        .where_eq(
            Column::new(tables::PEOPLE_CATEGORIES, columns::PEOPLE_CATEGORY_NAME),
            category,
        )
}

/// Recognized attributes per person, first row per (person, name) kept.
type AttributeIndex = HashMap<Uuid, HashMap<PersonAttribute, Option<String>>>;

fn index_attributes(rows: Vec<PersonAttributeRow>) -> AttributeIndex {
    let mut index = AttributeIndex::new();

    for row in rows {
        let Some(attribute) = PersonAttribute::from_name(&row.attrname) else {
            trace!(attrname = %row.attrname, "ignoring unrecognized person attribute");
            continue;
        };

        index
            .entry(row.personuuid)
            .or_default()
            .entry(attribute)
            .or_insert(row.attrvalue);
    }

    index
}

/// Fold attribute rows into people.
///
/// Output keeps the order of `people`. A null `attrvalue` still claims the
/// slot, leaving the field absent.
pub fn shape_people(people: Vec<PersonRow>, attributes: Vec<PersonAttributeRow>) -> Vec<Person> {
    let index = index_attributes(attributes);

    people
        .into_iter()
        .map(|row| {
            let attrs = index.get(&row.personuuid);
            let mut person = Person::from_row(row);

            for (attribute, value) in attrs.into_iter().flatten() {
                person.set_attribute(*attribute, value.clone());
            }

            person
        })
        .collect()
}

/// People repository
pub struct PeopleRepo<'a, E: Executor + ?Sized> {
    executor: &'a E,
}

impl<'a, E: Executor + ?Sized> PeopleRepo<'a, E> {
    pub fn new(executor: &'a E) -> Self {
        Self { executor }
    }

    /// All people in `category` with their dynamic attributes.
    ///
    /// Unknown categories yield an empty list. Both queries run concurrently;
    /// either failing fails the call.
    pub async fn get_people(&self, category: &str) -> Result<Vec<Person>> {
        let people_query = people_query(category);
        let attributes_query = attribute_values_query(category);

        let (people, attributes) = futures::try_join!(
            self.executor.execute(&people_query),
            self.executor.execute(&attributes_query),
        )?;

        let people: Vec<PersonRow> = decode_records(tables::PEOPLE, people)?;
        let attributes: Vec<PersonAttributeRow> =
            decode_records(tables::PEOPLE_ATTRIBUTES, attributes)?;

        debug!(
            category,
            people = people.len(),
            attributes = attributes.len(),
            "shaping people"
        );

        Ok(shape_people(people, attributes))
    }
}

/// Convenience wrapper around [`PeopleRepo::get_people`].
pub async fn get_people<E: Executor + ?Sized>(executor: &E, category: &str) -> Result<Vec<Person>> {
    PeopleRepo::new(executor).get_people(category).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RefdataError;
    use crate::executor::MockExecutor;
    use crate::query::Value;
    use serde_json::json;

    const ANN: &str = "6f1c1a64-0a55-4c3e-9a59-1e0f4f0d2a11";
    const BOB: &str = "0b7e33a2-5d2c-4d4e-8a0f-3c6b9d5e7f22";

    fn person(uuid: &str, first: &str) -> serde_json::Value {
        json!({
            "personuuid": uuid,
            "peoplecategoryid": 1,
            "peoplecategoryname": "customer",
            "firstname": first,
            "middlename": null,
            "lastname": "Smith",
            "phonenumber": "5551234",
            "phonearea": "555",
            "phonecountry": "1",
            "companyname": "Acme",
            "lastmodified": "2024-03-01T12:00:00+00:00",
        })
    }

    fn attr(uuid: &str, name: &str, value: &str) -> serde_json::Value {
        json!({ "personuuid": uuid, "attrname": name, "attrvalue": value })
    }

    fn uuid(s: &str) -> Uuid {
        Uuid::parse_str(s).unwrap()
    }

    #[test]
    fn attribute_names_round_trip() {
        for attribute in PersonAttribute::ALL {
            assert_eq!(PersonAttribute::from_name(attribute.as_str()), Some(attribute));
        }
        assert_eq!(PersonAttribute::from_name("Notes"), None);
        assert_eq!(PersonAttribute::from_name("email"), None);
    }

    #[test]
    fn people_query_sql() {
        let query = people_query("customer");
        assert_eq!(
            query.to_builder().sql(),
            "SELECT people.personuuid, people.peoplecategoryid, \
             people_categories.peoplecategoryname, people.firstname, people.middlename, \
             people.lastname, people.phonenumber, people.phonearea, people.phonecountry, \
             people.companyname, people.lastmodified \
             FROM people \
             INNER JOIN people_categories ON people.peoplecategoryid = people_categories.peoplecategoryid \
             WHERE people_categories.peoplecategoryname = $1"
        );
        assert_eq!(query.filters()[0].value, Value::from("customer"));
    }

    #[test]
    fn attribute_values_query_sql() {
        let query = attribute_values_query("supplier");
        assert_eq!(
            query.to_builder().sql(),
            "SELECT people_attributes.personuuid, people_attribute_types.attrname, \
             people_attributes.attrvalue \
             FROM people_attributes \
             INNER JOIN people_attribute_types ON people_attributes.attrid = people_attribute_types.attrid \
             INNER JOIN people_category_attributes ON people_attribute_types.attrid = people_category_attributes.attrid \
             INNER JOIN people_categories ON people_categories.peoplecategoryid = people_category_attributes.peoplecategoryid \
             WHERE people_categories.peoplecategoryname = $1"
        );
        assert_eq!(query.filters()[0].value, Value::from("supplier"));
    }

    #[tokio::test]
    async fn unknown_category_is_empty() {
        let mock = MockExecutor::new();
        let people = get_people(&mock, "nobody").await.unwrap();
        assert!(people.is_empty());
    }

    #[tokio::test]
    async fn username_only() {
        let mock = MockExecutor::new()
            .with_rows(tables::PEOPLE, [person(ANN, "Ann")])
            .with_rows(tables::PEOPLE_ATTRIBUTES, [attr(ANN, "username", "ann1")]);

        let people = get_people(&mock, "customer").await.unwrap();
        assert_eq!(people.len(), 1);

        let ann = &people[0];
        assert_eq!(ann.uuid, uuid(ANN));
        assert_eq!(ann.first_name.as_deref(), Some("Ann"));
        assert_eq!(ann.people_category, "customer");
        assert_eq!(ann.username.as_deref(), Some("ann1"));
        assert_eq!(ann.notes, None);
        assert_eq!(ann.payment_frequency, None);

        let value = serde_json::to_value(ann).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj["username"], "ann1");
        assert!(!obj.contains_key("notes"));
        assert!(!obj.contains_key("paymentFrequency"));
        assert_eq!(obj["firstName"], "Ann");
        assert_eq!(obj["peopleCategory"], "customer");
    }

    #[tokio::test]
    async fn issues_both_queries_with_category() {
        let mock = MockExecutor::new();
        get_people(&mock, "customer").await.unwrap();

        let executed = mock.executed();
        assert_eq!(executed.len(), 2);
        assert!(executed.contains(&people_query("customer")));
        assert!(executed.contains(&attribute_values_query("customer")));
    }

    #[test]
    fn notes_copied_exactly() {
        let notes = "  pays late; prefers email\n";
        let people = vec![serde_json::from_value(person(ANN, "Ann")).unwrap()];
        let attrs = vec![serde_json::from_value(attr(ANN, "notes", notes)).unwrap()];

        let shaped = shape_people(people, attrs);
        assert_eq!(shaped[0].notes.as_deref(), Some(notes));
        assert_eq!(shaped[0].attribute(PersonAttribute::Notes), Some(notes));
    }

    #[test]
    fn first_duplicate_wins() {
        let people = vec![serde_json::from_value(person(ANN, "Ann")).unwrap()];
        let attrs = vec![
            serde_json::from_value(attr(ANN, "paymentFrequency", "monthly")).unwrap(),
            serde_json::from_value(attr(ANN, "paymentFrequency", "weekly")).unwrap(),
        ];

        let shaped = shape_people(people, attrs);
        assert_eq!(shaped[0].payment_frequency.as_deref(), Some("monthly"));
    }

    #[test]
    fn attributes_go_to_their_owner() {
        let people = vec![
            serde_json::from_value(person(ANN, "Ann")).unwrap(),
            serde_json::from_value(person(BOB, "Bob")).unwrap(),
        ];
        let attrs = vec![
            serde_json::from_value(attr(BOB, "username", "bob")).unwrap(),
            serde_json::from_value(attr(ANN, "notes", "vip")).unwrap(),
            serde_json::from_value(attr(ANN, "email", "ann@example.com")).unwrap(),
        ];

        let shaped = shape_people(people, attrs);
        assert_eq!(shaped[0].first_name.as_deref(), Some("Ann"));
        assert_eq!(shaped[0].notes.as_deref(), Some("vip"));
        assert_eq!(shaped[0].username, None);
        assert_eq!(shaped[1].first_name.as_deref(), Some("Bob"));
        assert_eq!(shaped[1].username.as_deref(), Some("bob"));
        assert_eq!(shaped[1].notes, None);
    }

    #[test]
    fn duplicate_person_rows_both_get_attributes() {
        let people = vec![
            serde_json::from_value(person(ANN, "Ann")).unwrap(),
            serde_json::from_value(person(ANN, "Ann")).unwrap(),
        ];
        let attrs = vec![serde_json::from_value(attr(ANN, "username", "ann1")).unwrap()];

        let shaped = shape_people(people, attrs);
        assert_eq!(shaped[0].username.as_deref(), Some("ann1"));
        assert_eq!(shaped[1].username.as_deref(), Some("ann1"));
    }

    #[test]
    fn null_attribute_value_stays_absent() {
        let people = vec![serde_json::from_value(person(ANN, "Ann")).unwrap()];
        let attrs: Vec<PersonAttributeRow> = vec![serde_json::from_value(
            json!({ "personuuid": ANN, "attrname": "notes", "attrvalue": null }),
        )
        .unwrap()];

        let shaped = shape_people(people, attrs);
        let value = serde_json::to_value(&shaped[0]).unwrap();
        assert!(!value.as_object().unwrap().contains_key("notes"));
    }

    #[tokio::test]
    async fn null_names_do_not_fail_the_category() {
        let mut bob = person(BOB, "Bob");
        bob["lastname"] = serde_json::Value::Null;
        bob["firstname"] = serde_json::Value::Null;
        let mock = MockExecutor::new()
            .with_rows(tables::PEOPLE, [person(ANN, "Ann"), bob])
            .with_rows(tables::PEOPLE_ATTRIBUTES, [attr(BOB, "username", "bob")]);

        let people = get_people(&mock, "customer").await.unwrap();
        assert_eq!(people.len(), 2);
        assert_eq!(people[0].last_name.as_deref(), Some("Smith"));
        assert_eq!(people[1].last_name, None);
        assert_eq!(people[1].first_name, None);
        assert_eq!(people[1].username.as_deref(), Some("bob"));

        let value = serde_json::to_value(&people[1]).unwrap();
        assert_eq!(value["lastName"], serde_json::Value::Null);
        assert_eq!(value["firstName"], serde_json::Value::Null);
    }

    #[test]
    fn last_modified_is_utc() {
        let mut row = person(ANN, "Ann");
        row["lastmodified"] = json!("2024-03-01T14:30:00.25+02:00");
        let shaped = shape_people(vec![serde_json::from_value(row).unwrap()], Vec::new());

        let expected = DateTime::parse_from_rfc3339("2024-03-01T12:30:00.25Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(shaped[0].last_modified, Some(expected));
        assert_eq!(
            serde_json::to_value(&shaped[0]).unwrap()["lastModified"],
            "2024-03-01T12:30:00.250Z"
        );
    }

    #[test]
    fn last_modified_without_offset_is_read_as_utc() {
        let mut row = person(ANN, "Ann");
        row["lastmodified"] = json!("2024-03-01T12:00:00");
        let parsed: PersonRow = serde_json::from_value(row).unwrap();

        assert_eq!(
            parsed.lastmodified.map(|dt| dt.to_rfc3339()),
            Some("2024-03-01T12:00:00+00:00".to_string())
        );
    }

    #[test]
    fn missing_or_null_last_modified_is_none() {
        let mut row = person(ANN, "Ann");
        row["lastmodified"] = serde_json::Value::Null;
        let parsed: PersonRow = serde_json::from_value(row.clone()).unwrap();
        assert_eq!(parsed.lastmodified, None);

        row.as_object_mut().unwrap().remove("lastmodified");
        let parsed: PersonRow = serde_json::from_value(row).unwrap();
        assert_eq!(parsed.lastmodified, None);
    }

    #[tokio::test]
    async fn bad_last_modified_is_decode_error() {
        let mut row = person(ANN, "Ann");
        row["lastmodified"] = json!("yesterday");
        let mock = MockExecutor::new().with_rows(tables::PEOPLE, [row]);

        let err = get_people(&mock, "customer").await.unwrap_err();
        assert!(matches!(err, RefdataError::Decode { table: "people", .. }));
        assert!(err.to_string().contains("people"));
    }

    #[tokio::test]
    async fn query_failure_propagates() {
        let mock = MockExecutor::new()
            .with_rows(tables::PEOPLE, [person(ANN, "Ann")])
            .failing_on(tables::PEOPLE_ATTRIBUTES);

        let err = get_people(&mock, "customer").await.unwrap_err();
        assert!(matches!(err, RefdataError::Database(sqlx::Error::PoolClosed)));
    }

    #[tokio::test]
    async fn malformed_row_is_decode_error() {
        let mock = MockExecutor::new()
            .with_rows(tables::PEOPLE, [json!({ "personuuid": "not-a-uuid" })]);

        let err = get_people(&mock, "customer").await.unwrap_err();
        assert!(matches!(err, RefdataError::Decode { table: "people", .. }));
    }

    #[tokio::test]
    async fn works_through_trait_object() {
        let mock = MockExecutor::new().with_rows(tables::PEOPLE, [person(ANN, "Ann")]);
        let executor: &dyn Executor = &mock;

        let people = PeopleRepo::new(executor).get_people("customer").await.unwrap();
        assert_eq!(people.len(), 1);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn get_people_from_database() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let pool = crate::config::DatabaseConfig::with_url(url)
            .connect()
            .await
            .expect("pool creation failed");
        let executor = crate::executor::PgExecutor::new(pool);

        let people = get_people(&executor, "customer").await.expect("query failed");
        for person in people {
            assert_eq!(person.people_category, "customer");
        }
    }
}
