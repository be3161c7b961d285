use crate::domain::capability::Capability;
use crate::domain::quote::PriceQuote;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct QuoteRow {
    capability: Capability,
    source: String,
    cost_usd: Decimal,
    rate: Decimal,
    cost_local: Decimal,
    markup: Decimal,
    price: u64,
    margin: Decimal,
    margin_pct: Decimal,
}

impl From<&PriceQuote> for QuoteRow {
    fn from(quote: &PriceQuote) -> Self {
        Self {
            capability: quote.capability,
            source: quote.source.label(),
            cost_usd: quote.foreign_cost.normalize(),
            rate: quote.exchange_rate.normalize(),
            cost_local: quote.local_cost.normalize(),
            markup: quote.markup_percentage.normalize(),
            price: quote.final_price,
            margin: quote.margin.normalize(),
            margin_pct: quote.margin_percentage.round_dp(2).normalize(),
        }
    }
}

/// Writes the margin summary, one row per quote.
pub struct QuoteWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> QuoteWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_quotes<'a, I>(&mut self, quotes: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a PriceQuote>,
    {
        for quote in quotes {
            self.writer.serialize(QuoteRow::from(quote))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
