use packed_struct::prelude::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::hid_report::{
    PackedContact, PackedPtpReport, MAX_CONTACTS, PTP_REPORT_SIZE, REPORTID_MULTITOUCH,
};

/// Axis bounds of a sensor. Raw positions are shifted by these bounds into
/// the unsigned coordinate space of the multitouch report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub struct Calibration {
    pub x_min: i32,
    pub x_max: i32,
    pub y_min: i32,
    pub y_max: i32,
}

/// A single normalized contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Contact {
    pub contact_id: u8,
    pub x: u16,
    pub y: u16,
    pub tip_switch: bool,
    pub confidence: bool,
}

impl From<PackedContact> for Contact {
    fn from(packed: PackedContact) -> Self {
        Self {
            contact_id: packed.contact_id,
            x: packed.x.to_primitive(),
            y: packed.y.to_primitive(),
            tip_switch: packed.tip_switch,
            confidence: packed.confidence,
        }
    }
}

impl From<Contact> for PackedContact {
    fn from(contact: Contact) -> Self {
        Self {
            contact_id: contact.contact_id,
            x: Integer::from_primitive(contact.x),
            y: Integer::from_primitive(contact.y),
            _unused: Integer::from_primitive(0),
            confidence: contact.confidence,
            tip_switch: contact.tip_switch,
        }
    }
}

/// Canonical multitouch report produced for every decoded packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TouchReport {
    pub report_id: u8,
    pub button_clicked: bool,
    /// Time since the previous report, saturated rather than wrapped
    pub scan_time: u16,
    contact_count: u8,
    contacts: [Contact; MAX_CONTACTS],
}

impl Default for TouchReport {
    fn default() -> Self {
        Self {
            report_id: REPORTID_MULTITOUCH,
            button_clicked: false,
            scan_time: 0,
            contact_count: 0,
            contacts: [Contact::default(); MAX_CONTACTS],
        }
    }
}

impl TouchReport {
    pub fn new(button_clicked: bool, scan_time: u16) -> Self {
        Self {
            button_clicked,
            scan_time,
            ..Default::default()
        }
    }

    /// Appends a contact. Returns false and drops the contact if every slot
    /// is already in use.
    pub fn push_contact(&mut self, contact: Contact) -> bool {
        let index = self.contact_count as usize;
        let Some(slot) = self.contacts.get_mut(index) else {
            return false;
        };
        *slot = contact;
        self.contact_count += 1;
        true
    }

    pub fn contact_count(&self) -> u8 {
        self.contact_count
    }

    /// The populated contacts, in report order
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts[..self.contact_count as usize]
    }

    /// Pack the report into the fixed layout expected by the host
    pub fn pack(&self) -> Result<[u8; PTP_REPORT_SIZE], PackingError> {
        PackedPtpReport::from(self).pack()
    }

    /// Unpack a report previously written into an upstream buffer
    pub fn unpack(buf: &[u8]) -> Result<Self, PackingError> {
        let packed = PackedPtpReport::unpack_from_slice(buf)?;
        Ok(packed.into())
    }
}

impl From<&TouchReport> for PackedPtpReport {
    fn from(report: &TouchReport) -> Self {
        let mut packed = PackedPtpReport {
            report_id: report.report_id,
            contact_count: report.contact_count,
            button_clicked: report.button_clicked as u8,
            scan_time: Integer::from_primitive(report.scan_time),
            ..Default::default()
        };
        for (slot, contact) in packed.contacts.iter_mut().zip(report.contacts()) {
            *slot = (*contact).into();
        }
        packed
    }
}

impl From<PackedPtpReport> for TouchReport {
    fn from(packed: PackedPtpReport) -> Self {
        let mut report = TouchReport {
            report_id: packed.report_id,
            button_clicked: packed.button_clicked != 0,
            scan_time: packed.scan_time.to_primitive(),
            ..Default::default()
        };
        let count = (packed.contact_count as usize).min(MAX_CONTACTS);
        for contact in packed.contacts.iter().take(count) {
            report.push_contact((*contact).into());
        }
        report
    }
}
