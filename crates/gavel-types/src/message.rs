//! Envelopes and the closed set of auction messages
//!
//! On the wire an envelope carries a performative and semicolon-delimited
//! content. When a performative is overloaded the first field is a tag:
//!
//! ```text
//! INFORM           PUBLISH;item;price | START;item;price;secs | MAX_BID;amount
//!                  TIME_EXTENDED;secs | NO_SALE;item | CLOSED;item
//! CFP              item;price
//! PROPOSE          BID;amount | RELAY;bidder;amount
//! ACCEPT_PROPOSAL  item;amount
//! REJECT_PROPOSAL  TOO_LOW;current_max | LOST;item
//! REQUEST          MORE_TIME
//! ```
//!
//! Content is decoded once, at the receiving role, into [`Message`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::listing::{validate_item, Price};
use crate::{CodecError, ParticipantId};

/// Communicative act of an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Performative {
    Inform,
    Cfp,
    Propose,
    AcceptProposal,
    RejectProposal,
    Request,
}

impl fmt::Display for Performative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Inform => "INFORM",
            Self::Cfp => "CFP",
            Self::Propose => "PROPOSE",
            Self::AcceptProposal => "ACCEPT_PROPOSAL",
            Self::RejectProposal => "REJECT_PROPOSAL",
            Self::Request => "REQUEST",
        };
        f.write_str(s)
    }
}

/// Decoded auction message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    /// Seller → Auctioneer: a listing is pending
    Publish { item: String, reserve_price: Price },
    /// Seller → Auctioneer: open the auction
    Start {
        item: String,
        reserve_price: Price,
        duration_secs: u64,
    },
    /// Auctioneer → Buyers: current maximum
    MaxBid { amount: Price },
    /// Seller → bidders: new remaining time
    TimeExtended { remaining_secs: u64 },
    /// Seller → bidders: nobody met the reserve
    NoSale { item: String },
    /// Seller → Auctioneer, then Auctioneer → roster: session is over
    Closed { item: String },
    /// Auctioneer → Buyers: invitation to bid
    CallForProposals { item: String, reserve_price: Price },
    /// Buyer → Auctioneer
    Bid { amount: Price },
    /// Auctioneer → Seller: an admitted bid
    Relay { bidder: ParticipantId, amount: Price },
    /// Seller → winner
    Accept { item: String, amount: Price },
    /// Auctioneer → Buyer: bid did not beat the current maximum
    BidTooLow { current_max: Price },
    /// Seller → losing bidders
    Lost { item: String },
    /// Buyer → Seller: time-extension request
    MoreTime,
}

impl Message {
    /// Performative this message travels under
    pub fn performative(&self) -> Performative {
        match self {
            Self::Publish { .. }
            | Self::Start { .. }
            | Self::MaxBid { .. }
            | Self::TimeExtended { .. }
            | Self::NoSale { .. }
            | Self::Closed { .. } => Performative::Inform,
            Self::CallForProposals { .. } => Performative::Cfp,
            Self::Bid { .. } | Self::Relay { .. } => Performative::Propose,
            Self::Accept { .. } => Performative::AcceptProposal,
            Self::BidTooLow { .. } | Self::Lost { .. } => Performative::RejectProposal,
            Self::MoreTime => Performative::Request,
        }
    }

    /// Render the wire content
    pub fn encode(&self) -> String {
        match self {
            Self::Publish {
                item,
                reserve_price,
            } => format!("PUBLISH;{item};{reserve_price}"),
            Self::Start {
                item,
                reserve_price,
                duration_secs,
            } => format!("START;{item};{reserve_price};{duration_secs}"),
            Self::MaxBid { amount } => format!("MAX_BID;{amount}"),
            Self::TimeExtended { remaining_secs } => format!("TIME_EXTENDED;{remaining_secs}"),
            Self::NoSale { item } => format!("NO_SALE;{item}"),
            Self::Closed { item } => format!("CLOSED;{item}"),
            Self::CallForProposals {
                item,
                reserve_price,
            } => format!("{item};{reserve_price}"),
            Self::Bid { amount } => format!("BID;{amount}"),
            Self::Relay { bidder, amount } => format!("RELAY;{bidder};{amount}"),
            Self::Accept { item, amount } => format!("{item};{amount}"),
            Self::BidTooLow { current_max } => format!("TOO_LOW;{current_max}"),
            Self::Lost { item } => format!("LOST;{item}"),
            Self::MoreTime => "MORE_TIME".to_string(),
        }
    }

    /// Decode wire content received under `performative`
    pub fn decode(performative: Performative, content: &str) -> Result<Self, CodecError> {
        if content.trim().is_empty() {
            return Err(CodecError::Empty { performative });
        }
        let fields: Vec<&str> = content.split(';').map(str::trim).collect();
        let unknown = || CodecError::UnknownTag {
            performative,
            tag: fields[0].to_string(),
        };

        match performative {
            Performative::Inform => match fields[0] {
                "PUBLISH" => {
                    let [item, price] = take::<2>("PUBLISH", &fields[1..])?;
                    Ok(Self::Publish {
                        item: item_field("PUBLISH", item)?,
                        reserve_price: number("PUBLISH", price)?,
                    })
                }
                "START" => {
                    let [item, price, secs] = take::<3>("START", &fields[1..])?;
                    Ok(Self::Start {
                        item: item_field("START", item)?,
                        reserve_price: number("START", price)?,
                        duration_secs: number("START", secs)?,
                    })
                }
                // NEW_BID is the older name of the max-bid broadcast
                "MAX_BID" | "NEW_BID" => {
                    let [amount] = take::<1>("MAX_BID", &fields[1..])?;
                    Ok(Self::MaxBid {
                        amount: number("MAX_BID", amount)?,
                    })
                }
                "TIME_EXTENDED" => {
                    let [secs] = take::<1>("TIME_EXTENDED", &fields[1..])?;
                    Ok(Self::TimeExtended {
                        remaining_secs: number("TIME_EXTENDED", secs)?,
                    })
                }
                "NO_SALE" => {
                    let [item] = take::<1>("NO_SALE", &fields[1..])?;
                    Ok(Self::NoSale {
                        item: item_field("NO_SALE", item)?,
                    })
                }
                "CLOSED" => {
                    let [item] = take::<1>("CLOSED", &fields[1..])?;
                    Ok(Self::Closed {
                        item: item_field("CLOSED", item)?,
                    })
                }
                _ => Err(unknown()),
            },
            Performative::Cfp => {
                let [item, price] = take::<2>("CFP", &fields)?;
                Ok(Self::CallForProposals {
                    item: item_field("CFP", item)?,
                    reserve_price: number("CFP", price)?,
                })
            }
            Performative::Propose => match fields[0] {
                "BID" => {
                    let [amount] = take::<1>("BID", &fields[1..])?;
                    Ok(Self::Bid {
                        amount: number("BID", amount)?,
                    })
                }
                "RELAY" => {
                    let [bidder, amount] = take::<2>("RELAY", &fields[1..])?;
                    Ok(Self::Relay {
                        bidder: ParticipantId::parse(bidder).map_err(|source| {
                            CodecError::InvalidField {
                                tag: "RELAY",
                                source,
                            }
                        })?,
                        amount: number("RELAY", amount)?,
                    })
                }
                _ => Err(unknown()),
            },
            Performative::AcceptProposal => {
                let [item, amount] = take::<2>("ACCEPT", &fields)?;
                Ok(Self::Accept {
                    item: item_field("ACCEPT", item)?,
                    amount: number("ACCEPT", amount)?,
                })
            }
            Performative::RejectProposal => match fields[0] {
                "TOO_LOW" => {
                    let [max] = take::<1>("TOO_LOW", &fields[1..])?;
                    Ok(Self::BidTooLow {
                        current_max: number("TOO_LOW", max)?,
                    })
                }
                "LOST" => {
                    let [item] = take::<1>("LOST", &fields[1..])?;
                    Ok(Self::Lost {
                        item: item_field("LOST", item)?,
                    })
                }
                _ => Err(unknown()),
            },
            Performative::Request => match fields.as_slice() {
                ["MORE_TIME"] => Ok(Self::MoreTime),
                _ => Err(unknown()),
            },
        }
    }
}

fn take<'a, const N: usize>(
    tag: &'static str,
    fields: &[&'a str],
) -> Result<[&'a str; N], CodecError> {
    <[&str; N]>::try_from(fields).map_err(|_| CodecError::FieldCount {
        tag,
        expected: N,
        actual: fields.len(),
    })
}

fn number<T: FromStr>(tag: &'static str, value: &str) -> Result<T, CodecError> {
    value.parse().map_err(|_| CodecError::InvalidNumber {
        tag,
        value: value.to_string(),
    })
}

fn item_field(tag: &'static str, value: &str) -> Result<String, CodecError> {
    validate_item(value).map_err(|source| CodecError::InvalidField { tag, source })
}

/// A typed envelope as carried by the messaging substrate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub performative: Performative,
    pub sender: ParticipantId,
    /// Never empty
    pub recipients: Vec<ParticipantId>,
    pub content: String,
}

impl Envelope {
    /// Point-to-point envelope
    pub fn to_one(sender: &ParticipantId, recipient: &ParticipantId, message: &Message) -> Self {
        Self {
            performative: message.performative(),
            sender: sender.clone(),
            recipients: vec![recipient.clone()],
            content: message.encode(),
        }
    }

    /// Multicast envelope; `None` when there is nobody to address
    pub fn to_many<'a, I>(sender: &ParticipantId, recipients: I, message: &Message) -> Option<Self>
    where
        I: IntoIterator<Item = &'a ParticipantId>,
    {
        let mut recipients: Vec<ParticipantId> = recipients.into_iter().cloned().collect();
        recipients.sort();
        recipients.dedup();
        if recipients.is_empty() {
            return None;
        }
        Some(Self {
            performative: message.performative(),
            sender: sender.clone(),
            recipients,
            content: message.encode(),
        })
    }

    /// Raw envelope, as a foreign sender might produce it
    pub fn raw(
        performative: Performative,
        sender: &ParticipantId,
        recipient: &ParticipantId,
        content: impl Into<String>,
    ) -> Self {
        Self {
            performative,
            sender: sender.clone(),
            recipients: vec![recipient.clone()],
            content: content.into(),
        }
    }

    /// Decode the content into a [`Message`]
    pub fn decode(&self) -> Result<Message, CodecError> {
        Message::decode(self.performative, &self.content)
    }

    pub fn is_addressed_to(&self, id: &ParticipantId) -> bool {
        self.recipients.contains(id)
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let to: Vec<&str> = self.recipients.iter().map(ParticipantId::as_str).collect();
        write!(
            f,
            "{} {} -> [{}]: {}",
            self.performative,
            self.sender,
            to.join(","),
            self.content
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn id(s: &str) -> ParticipantId {
        ParticipantId::parse(s).unwrap()
    }

    #[test]
    fn test_encode_matches_wire_format() {
        let start = Message::Start {
            item: "Painting".to_string(),
            reserve_price: dec!(100),
            duration_secs: 60,
        };
        assert_eq!(start.encode(), "START;Painting;100;60");
        assert_eq!(start.performative(), Performative::Inform);

        let cfp = Message::CallForProposals {
            item: "Painting".to_string(),
            reserve_price: dec!(100.5),
        };
        assert_eq!(cfp.encode(), "Painting;100.5");
        assert_eq!(cfp.performative(), Performative::Cfp);

        let relay = Message::Relay {
            bidder: id("buyer-2"),
            amount: dec!(160),
        };
        assert_eq!(relay.encode(), "RELAY;buyer-2;160");
    }

    #[test]
    fn test_decode_each_performative() {
        assert_eq!(
            Message::decode(Performative::Inform, "MAX_BID;150").unwrap(),
            Message::MaxBid { amount: dec!(150) }
        );
        assert_eq!(
            Message::decode(Performative::Cfp, "Vase;20").unwrap(),
            Message::CallForProposals {
                item: "Vase".to_string(),
                reserve_price: dec!(20)
            }
        );
        assert_eq!(
            Message::decode(Performative::Propose, "BID;21.75").unwrap(),
            Message::Bid { amount: dec!(21.75) }
        );
        assert_eq!(
            Message::decode(Performative::AcceptProposal, "Vase;30").unwrap(),
            Message::Accept {
                item: "Vase".to_string(),
                amount: dec!(30)
            }
        );
        assert_eq!(
            Message::decode(Performative::RejectProposal, "TOO_LOW;30").unwrap(),
            Message::BidTooLow {
                current_max: dec!(30)
            }
        );
        assert_eq!(
            Message::decode(Performative::RejectProposal, "LOST;Vase").unwrap(),
            Message::Lost {
                item: "Vase".to_string()
            }
        );
        assert_eq!(
            Message::decode(Performative::Request, "MORE_TIME").unwrap(),
            Message::MoreTime
        );
    }

    #[test]
    fn test_new_bid_alias() {
        assert_eq!(
            Message::decode(Performative::Inform, "NEW_BID;42").unwrap(),
            Message::MaxBid { amount: dec!(42) }
        );
    }

    #[test]
    fn test_malformed_content() {
        assert!(matches!(
            Message::decode(Performative::Propose, "BID;lots"),
            Err(CodecError::InvalidNumber { tag: "BID", .. })
        ));
        assert!(matches!(
            Message::decode(Performative::Propose, "BID"),
            Err(CodecError::FieldCount {
                expected: 1,
                actual: 0,
                ..
            })
        ));
        assert!(matches!(
            Message::decode(Performative::Inform, "SHOUT;loud"),
            Err(CodecError::UnknownTag { .. })
        ));
        assert!(matches!(
            Message::decode(Performative::Propose, ""),
            Err(CodecError::Empty { .. })
        ));
        assert!(matches!(
            Message::decode(Performative::Propose, "RELAY;bad id;10"),
            Err(CodecError::InvalidField { tag: "RELAY", .. })
        ));
        // tag belongs to another performative
        assert!(Message::decode(Performative::Request, "BID;10").is_err());
    }

    #[test]
    fn test_to_many_dedups_and_skips_empty() {
        let sender = ParticipantId::auctioneer();
        let buyers = vec![id("b"), id("a"), id("b")];
        let env = Envelope::to_many(&sender, &buyers, &Message::MaxBid { amount: dec!(1) })
            .unwrap();
        assert_eq!(env.recipients, vec![id("a"), id("b")]);

        let nobody: Vec<ParticipantId> = Vec::new();
        assert!(Envelope::to_many(&sender, &nobody, &Message::MoreTime).is_none());
    }

    #[test]
    fn test_envelope_decode() {
        let env = Envelope::to_one(
            &id("buyer-1"),
            &ParticipantId::auctioneer(),
            &Message::Bid { amount: dec!(150) },
        );
        assert_eq!(env.performative, Performative::Propose);
        assert!(env.is_addressed_to(&ParticipantId::auctioneer()));
        assert_eq!(env.decode().unwrap(), Message::Bid { amount: dec!(150) });
        assert_eq!(env.to_string(), "PROPOSE buyer-1 -> [auctioneer]: BID;150");
    }
}
