// src/notify/format.rs
// Renders the message body for one listing. The layout follows the format
// subscribers already know from the marketplace alerts: labelled lines plus
// a link anchor, HTML-escaped where user-controlled text flows in.

use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::source::ListingRecord;

/// Best-offer marker: green when the seller accepts offers.
fn best_offer_marker(record: &ListingRecord) -> &'static str {
    if record.best_offer {
        "🟢"
    } else {
        "🔴"
    }
}

/// HTML message body for a new listing.
pub fn format_listing(record: &ListingRecord) -> String {
    let title = encode_text(&record.title);
    let link = encode_double_quoted_attribute(&record.url);
    let condition = record.condition.as_deref().unwrap_or("-");
    let feedback = record.feedback_count.unwrap_or(0);
    let published = record.first_seen_at.format("%d.%m.%Y %H:%M UTC");

    format!(
        "<b>Name:</b> {title}\n\n\
         <b>Preis:</b> {price}\n\
         <b>Preisvorschlag:</b> {marker}\n\
         <b>Artikelzustand:</b> {condition}\n\
         <b>Bewertungen:</b> {feedback}\n\
         <b>Veröffentlicht:</b> {published}\n\n\
         <a href=\"{link}\">Öffne Link</a>",
        price = record.price,
        marker = best_offer_marker(record),
        condition = encode_text(condition),
    )
}
