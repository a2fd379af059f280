use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use unicode_normalization::UnicodeNormalization;
use utoipa::ToSchema;

use super::GhnError;
use crate::models::PaymentMethod;

pub const BOOK_WEIGHT_GRAMS: i64 = 300;
pub const BOOK_LENGTH_CM: i64 = 25;
pub const BOOK_WIDTH_CM: i64 = 20;
pub const BOOK_HEIGHT_CM: i64 = 2;
/// GHN "standard" delivery.
pub const SERVICE_TYPE_STANDARD: i64 = 2;
/// Recipients may not open the parcel before paying.
pub const REQUIRED_NOTE: &str = "KHONGCHOXEMHANG";

const SUCCESS_CODE: i64 = 200;
const SUCCESS_MESSAGE: &str = "Success";
const STATUS_ACTIVE: i64 = 1;
const ENABLED: i64 = 1;
/// Areas that support both pickup and delivery.
const SUPPORT_TYPE_FULL: i64 = 3;

const PREVIEW_NAME: &str = "Test User";
const PREVIEW_PHONE: &str = "0971443356";
const PREVIEW_ADDRESS: &str = "Lang Test";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Province {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct District {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Ward {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PreviewInfo {
    pub shipping_fee: i64,
    pub shipping_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingOrderCreated {
    pub shipping_code: String,
    pub shipping_fee: i64,
}

#[derive(Debug, Clone)]
pub struct Recipient {
    pub name: String,
    pub phone: String,
    pub address: String,
}

/// Destination and size of a parcel of `quantity` books.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderParcel {
    pub district_id: i64,
    pub ward_code: String,
    pub quantity: i64,
}

impl OrderParcel {
    pub fn cache_key(&self) -> String {
        format!(
            "preview-{}-{}-{}",
            self.district_id, self.ward_code, self.quantity
        )
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl Envelope {
    /// Accept only `{ code: 200, message: "Success" }` and decode `data`.
    pub(crate) fn into_data<T: DeserializeOwned>(self) -> Result<T, GhnError> {
        if self.code != SUCCESS_CODE || self.message != SUCCESS_MESSAGE {
            return Err(GhnError::Rejected {
                code: self.code,
                message: self.message,
            });
        }
        match self.data {
            Some(Value::Null) | None => Err(GhnError::MissingData),
            Some(data) => Ok(serde_json::from_value(data)?),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawProvince {
    #[serde(rename = "ProvinceID")]
    province_id: Option<i64>,
    #[serde(rename = "ProvinceName")]
    province_name: Option<String>,
    #[serde(rename = "IsEnable")]
    is_enable: Option<i64>,
    #[serde(rename = "Status")]
    status: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawDistrict {
    #[serde(rename = "DistrictID")]
    district_id: Option<i64>,
    #[serde(rename = "DistrictName")]
    district_name: Option<String>,
    #[serde(rename = "IsEnable")]
    is_enable: Option<i64>,
    #[serde(rename = "Status")]
    status: Option<i64>,
    #[serde(rename = "SupportType")]
    support_type: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawWard {
    #[serde(rename = "WardCode")]
    ward_code: Option<String>,
    #[serde(rename = "WardName")]
    ward_name: Option<String>,
    #[serde(rename = "IsEnable")]
    is_enable: Option<i64>,
    #[serde(rename = "Status")]
    status: Option<i64>,
    #[serde(rename = "SupportType")]
    support_type: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawPreview {
    total_fee: i64,
    expected_delivery_time: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCreatedOrder {
    order_code: String,
    #[serde(default)]
    total_fee: Option<i64>,
}

fn is_active(status: Option<i64>, is_enable: Option<i64>) -> bool {
    status == Some(STATUS_ACTIVE) && is_enable == Some(ENABLED)
}

/// Vietnamese alphabet order. f, j, w and z only show up in loanwords and
/// sit where Latin puts them.
const ALPHABET: &str = "aăâbcdđeêfghijklmnoôơpqrstuưvwxyz";

/// Tone marks in dictionary order: huyền, hỏi, ngã, sắc, nặng.
fn tone_weight(mark: char) -> Option<u8> {
    match mark {
        '\u{0300}' => Some(1),
        '\u{0309}' => Some(2),
        '\u{0303}' => Some(3),
        '\u{0301}' => Some(4),
        '\u{0323}' => Some(5),
        _ => None,
    }
}

/// Breve, circumflex and horn make a different letter, not a tone.
fn is_letter_modifier(mark: char) -> bool {
    matches!(mark, '\u{0306}' | '\u{0302}' | '\u{031B}')
}

fn letter_weight(c: char) -> u32 {
    match ALPHABET.chars().position(|letter| letter == c) {
        Some(index) => 0x80 + index as u32,
        None if c.is_ascii() => u32::from(c),
        None => 0x11_0000 + u32::from(c),
    }
}

/// Sort key that orders names like a Vietnamese dictionary: letters first
/// (with `đ` after `d` and `ă`/`â` after `a`), then tones, then the raw
/// text as a tiebreak.
pub(crate) fn vietnamese_sort_key(name: &str) -> (Vec<u32>, Vec<u8>, String) {
    let lower = name.to_lowercase();
    let mut letters = String::with_capacity(lower.len());
    let mut tones: Vec<u8> = Vec::new();
    for c in lower.nfd() {
        if let Some(tone) = tone_weight(c) {
            if let Some(last) = tones.last_mut() {
                *last = tone;
            }
            continue;
        }
        if !is_letter_modifier(c) {
            tones.push(0);
        }
        letters.push(c);
    }
    let primary = letters.nfc().map(letter_weight).collect();
    (primary, tones, name.to_string())
}

pub(crate) fn project_provinces(raw: Vec<RawProvince>) -> Vec<Province> {
    let mut provinces: Vec<Province> = raw
        .into_iter()
        .filter(|p| is_active(p.status, p.is_enable))
        .filter_map(|p| {
            Some(Province {
                id: p.province_id?,
                name: p.province_name?,
            })
        })
        .collect();
    provinces.sort_by_cached_key(|p| vietnamese_sort_key(&p.name));
    provinces
}

pub(crate) fn project_districts(raw: Vec<RawDistrict>) -> Vec<District> {
    let mut districts: Vec<District> = raw
        .into_iter()
        .filter(|d| is_active(d.status, d.is_enable) && d.support_type == Some(SUPPORT_TYPE_FULL))
        .filter_map(|d| {
            Some(District {
                id: d.district_id?,
                name: d.district_name?,
            })
        })
        .collect();
    districts.sort_by_cached_key(|d| vietnamese_sort_key(&d.name));
    districts
}

pub(crate) fn project_wards(raw: Vec<RawWard>) -> Vec<Ward> {
    let mut wards: Vec<Ward> = raw
        .into_iter()
        .filter(|w| is_active(w.status, w.is_enable) && w.support_type == Some(SUPPORT_TYPE_FULL))
        .filter_map(|w| {
            Some(Ward {
                code: w.ward_code?,
                name: w.ward_name?,
            })
        })
        .collect();
    wards.sort_by_cached_key(|w| vietnamese_sort_key(&w.name));
    wards
}

impl From<RawPreview> for PreviewInfo {
    fn from(raw: RawPreview) -> Self {
        Self {
            shipping_fee: raw.total_fee,
            shipping_time: raw.expected_delivery_time,
        }
    }
}

impl From<RawCreatedOrder> for ShippingOrderCreated {
    fn from(raw: RawCreatedOrder) -> Self {
        Self {
            shipping_code: raw.order_code,
            shipping_fee: raw.total_fee.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ParcelItem<'a> {
    name: &'a str,
    quantity: i64,
    weight: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ShippingOrderRequest<'a> {
    payment_type_id: i64,
    required_note: &'a str,
    to_name: &'a str,
    to_phone: &'a str,
    to_address: &'a str,
    to_ward_code: &'a str,
    to_district_id: i64,
    weight: i64,
    length: i64,
    width: i64,
    height: i64,
    service_type_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<&'a str>,
    items: Vec<ParcelItem<'a>>,
}

/// COD orders are paid by the recipient, everything else by the shop.
fn payment_type_id(payment: PaymentMethod) -> i64 {
    match payment {
        PaymentMethod::Cod => 2,
        PaymentMethod::Momo => 1,
    }
}

fn parcel_request<'a>(
    parcel: &'a OrderParcel,
    to_name: &'a str,
    to_phone: &'a str,
    to_address: &'a str,
    payment_type_id: i64,
    item_name: &'a str,
    note: Option<&'a str>,
) -> ShippingOrderRequest<'a> {
    let weight = parcel.quantity * BOOK_WEIGHT_GRAMS;
    ShippingOrderRequest {
        payment_type_id,
        required_note: REQUIRED_NOTE,
        to_name,
        to_phone,
        to_address,
        to_ward_code: &parcel.ward_code,
        to_district_id: parcel.district_id,
        weight,
        length: BOOK_LENGTH_CM,
        width: BOOK_WIDTH_CM,
        height: parcel.quantity * BOOK_HEIGHT_CM,
        service_type_id: SERVICE_TYPE_STANDARD,
        note,
        items: vec![ParcelItem {
            name: item_name,
            quantity: parcel.quantity,
            weight,
        }],
    }
}

pub(crate) fn preview_request(parcel: &OrderParcel) -> ShippingOrderRequest<'_> {
    parcel_request(
        parcel,
        PREVIEW_NAME,
        PREVIEW_PHONE,
        PREVIEW_ADDRESS,
        payment_type_id(PaymentMethod::Cod),
        "Sách",
        None,
    )
}

pub(crate) fn create_request<'a>(
    recipient: &'a Recipient,
    payment: PaymentMethod,
    parcel: &'a OrderParcel,
    note: Option<&'a str>,
) -> ShippingOrderRequest<'a> {
    parcel_request(
        parcel,
        &recipient.name,
        &recipient.phone,
        &recipient.address,
        payment_type_id(payment),
        "Book",
        Some(note.unwrap_or_default()),
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn envelope(value: Value) -> Envelope {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn envelope_requires_success_code_and_message() {
        let ok: Vec<Value> = envelope(json!({ "code": 200, "message": "Success", "data": [] }))
            .into_data()
            .unwrap();
        assert!(ok.is_empty());

        let err = envelope(json!({ "code": 200, "message": "Pending", "data": [] }))
            .into_data::<Vec<Value>>()
            .unwrap_err();
        assert!(matches!(err, GhnError::Rejected { code: 200, .. }));

        let err = envelope(json!({ "code": 400, "message": "Success" }))
            .into_data::<Vec<Value>>()
            .unwrap_err();
        assert!(matches!(err, GhnError::Rejected { code: 400, .. }));

        let err = envelope(json!({ "code": 200, "message": "Success", "data": null }))
            .into_data::<Vec<Value>>()
            .unwrap_err();
        assert!(matches!(err, GhnError::MissingData));
    }

    #[test]
    fn provinces_keep_only_active_complete_entries_sorted_by_name() {
        let raw: Vec<RawProvince> = serde_json::from_value(json!([
            { "ProvinceID": 202, "ProvinceName": "Hồ Chí Minh", "IsEnable": 1, "Status": 1 },
            { "ProvinceID": 201, "ProvinceName": "Hà Nội", "IsEnable": 1, "Status": 1 },
            { "ProvinceID": 203, "ProvinceName": "Disabled", "IsEnable": 0, "Status": 1 },
            { "ProvinceID": 204, "ProvinceName": "Locked", "IsEnable": 1, "Status": 2 },
            { "ProvinceName": "No id", "IsEnable": 1, "Status": 1 }
        ]))
        .unwrap();

        let provinces = project_provinces(raw);
        assert_eq!(
            provinces,
            vec![
                Province { id: 201, name: "Hà Nội".into() },
                Province { id: 202, name: "Hồ Chí Minh".into() },
            ]
        );
    }

    #[test]
    fn provinces_follow_vietnamese_alphabet_order() {
        let names = [
            "Yên Bái", "Đà Nẵng", "Cần Thơ", "Hà Nội", "Điện Biên", "Đắk Lắk", "Hà Nam",
            "Hà Giang",
        ];
        let raw: Vec<RawProvince> = serde_json::from_value(Value::Array(
            names
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    json!({ "ProvinceID": i, "ProvinceName": name, "IsEnable": 1, "Status": 1 })
                })
                .collect(),
        ))
        .unwrap();

        let sorted: Vec<String> = project_provinces(raw).into_iter().map(|p| p.name).collect();
        assert_eq!(
            sorted,
            [
                "Cần Thơ", "Đà Nẵng", "Đắk Lắk", "Điện Biên", "Hà Giang", "Hà Nam", "Hà Nội",
                "Yên Bái",
            ]
        );
    }

    #[test]
    fn tones_only_break_ties_between_equal_letters() {
        let mut names = vec!["Hạ Long", "Hà Long", "Ha Long", "Hả Long", "Hai Long"];
        names.sort_by_cached_key(|name| vietnamese_sort_key(name));
        assert_eq!(names, ["Ha Long", "Hà Long", "Hả Long", "Hạ Long", "Hai Long"]);
    }

    #[test]
    fn districts_and_wards_require_full_support() {
        let districts: Vec<RawDistrict> = serde_json::from_value(json!([
            { "DistrictID": 1442, "DistrictName": "Quận 1", "IsEnable": 1, "Status": 1, "SupportType": 3 },
            { "DistrictID": 1443, "DistrictName": "Quận 2", "IsEnable": 1, "Status": 1, "SupportType": 1 },
            { "DistrictID": 1444, "DistrictName": "Quận 3", "IsEnable": 1, "Status": 1 }
        ]))
        .unwrap();
        assert_eq!(
            project_districts(districts),
            vec![District { id: 1442, name: "Quận 1".into() }]
        );

        let wards: Vec<RawWard> = serde_json::from_value(json!([
            { "WardCode": "20109", "WardName": "Phường Bến Nghé", "IsEnable": 1, "Status": 1, "SupportType": 3 },
            { "WardCode": "20110", "WardName": "Phường Đa Kao", "IsEnable": 1, "Status": 1, "SupportType": 0 },
            { "WardName": "Phường Không Mã", "IsEnable": 1, "Status": 1, "SupportType": 3 }
        ]))
        .unwrap();
        assert_eq!(
            project_wards(wards),
            vec![Ward { code: "20109".into(), name: "Phường Bến Nghé".into() }]
        );
    }

    #[test]
    fn preview_fields_are_renamed() {
        let raw: RawPreview = serde_json::from_value(json!({
            "total_fee": 33000,
            "expected_delivery_time": "2024-05-03T16:59:59Z",
            "service_fee": 33000
        }))
        .unwrap();
        assert_eq!(
            PreviewInfo::from(raw),
            PreviewInfo {
                shipping_fee: 33000,
                shipping_time: "2024-05-03T16:59:59Z".into()
            }
        );
    }

    #[test]
    fn parcel_dimensions_scale_with_quantity() {
        let parcel = OrderParcel {
            district_id: 1442,
            ward_code: "20109".into(),
            quantity: 3,
        };
        let body = serde_json::to_value(preview_request(&parcel)).unwrap();
        assert_eq!(body["weight"], 900);
        assert_eq!(body["height"], 6);
        assert_eq!(body["length"], 25);
        assert_eq!(body["width"], 20);
        assert_eq!(body["payment_type_id"], 2);
        assert_eq!(body["service_type_id"], 2);
        assert_eq!(body["required_note"], "KHONGCHOXEMHANG");
        assert_eq!(body["to_district_id"], 1442);
        assert_eq!(body["items"][0]["quantity"], 3);
        assert_eq!(body["items"][0]["weight"], 900);
        assert!(body.get("note").is_none());
    }

    #[test]
    fn create_request_maps_payment_and_recipient() {
        let parcel = OrderParcel {
            district_id: 1442,
            ward_code: "20109".into(),
            quantity: 1,
        };
        let recipient = Recipient {
            name: "Nguyễn Văn A".into(),
            phone: "0912345678".into(),
            address: "12 Lê Lợi".into(),
        };
        let body = serde_json::to_value(create_request(
            &recipient,
            PaymentMethod::Momo,
            &parcel,
            None,
        ))
        .unwrap();
        assert_eq!(body["payment_type_id"], 1);
        assert_eq!(body["to_name"], "Nguyễn Văn A");
        assert_eq!(body["to_phone"], "0912345678");
        assert_eq!(body["note"], "");
        assert_eq!(body["items"][0]["name"], "Book");
    }

    #[test]
    fn preview_cache_key_includes_destination_and_quantity() {
        let parcel = OrderParcel {
            district_id: 1442,
            ward_code: "20109".into(),
            quantity: 2,
        };
        assert_eq!(parcel.cache_key(), "preview-1442-20109-2");
    }
}
