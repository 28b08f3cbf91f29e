//! Manual Solana transaction wire format and signing.
//!
//! Transactions are built entirely by hand, with no `solana-sdk` dependency.
//! The wire format is a compact binary layout:
//!
//! ```text
//! Transaction:
//!   num_signatures          compact-u16
//!   signatures              64 bytes * num_signatures
//!   message:
//!     num_required_sigs     u8
//!     num_readonly_signed   u8
//!     num_readonly_unsigned u8
//!     num_accounts          compact-u16
//!     account_keys          32 bytes * num_accounts
//!     recent_blockhash      32 bytes
//!     num_instructions      compact-u16
//!     instructions[]        (see below)
//!
//! Instruction:
//!   program_id_index        u8
//!   num_accounts            compact-u16
//!   account_indices         u8 * num_accounts
//!   data_len                compact-u16
//!   data                    u8 * data_len
//! ```
//!
//! Multi-signer transactions (a fresh mint keypair co-signing with the
//! wallet) are assembled as an unsigned wire buffer with zeroed signature
//! slots; each signer then fills exactly its own slot with
//! [`sign_raw_transaction`], in any order.

use crate::address::Address;
use crate::error::WireError;
use crate::keypair::{Keypair, Signature};

// ---------------------------------------------------------------------------
// Solana System Program
// ---------------------------------------------------------------------------

/// The Solana System Program public key: 32 zero bytes.
/// Base58: `11111111111111111111111111111111`
pub const SYSTEM_PROGRAM_ID: [u8; 32] = [0u8; 32];

/// System Program `CreateAccount` instruction index (little-endian u32).
const SYSTEM_CREATE_ACCOUNT_IX_INDEX: u32 = 0;

/// Account keys are addressed by a u8 index.
const MAX_ACCOUNT_KEYS: usize = 256;

// ---------------------------------------------------------------------------
// Compact-u16 encoding
// ---------------------------------------------------------------------------

/// Encode a `u16` value in Solana's compact-u16 format.
///
/// - Values 0..0x7f       -> 1 byte
/// - Values 0x80..0x3fff  -> 2 bytes
/// - Values 0x4000..      -> 3 bytes
pub fn encode_compact_u16(value: u16) -> Vec<u8> {
    let mut val = value as u32;
    let mut out = Vec::with_capacity(3);

    loop {
        let mut byte = (val & 0x7f) as u8;
        val >>= 7;
        if val > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if val == 0 {
            break;
        }
    }

    out
}

/// Decode a compact-u16 value from a byte slice.
///
/// Returns `(value, bytes_consumed)` or an error if the data is truncated.
pub fn decode_compact_u16(data: &[u8]) -> Result<(u16, usize), WireError> {
    let mut value: u32 = 0;
    let mut shift = 0u32;
    let mut consumed = 0usize;

    loop {
        let byte = *data.get(consumed).ok_or_else(|| {
            WireError::SerializationError(
                "unexpected end of data while decoding compact-u16".into(),
            )
        })?;
        consumed += 1;

        value |= ((byte & 0x7f) as u32) << shift;
        shift += 7;

        if byte & 0x80 == 0 || consumed >= 3 {
            break;
        }
    }

    if value > u16::MAX as u32 {
        return Err(WireError::SerializationError(
            "compact-u16 value overflow".into(),
        ));
    }

    Ok((value as u16, consumed))
}

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// A single account reference in a Solana instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolAccountMeta {
    pub pubkey: [u8; 32],
    pub is_signer: bool,
    pub is_writable: bool,
}

impl SolAccountMeta {
    pub fn writable_signer(address: &Address) -> Self {
        Self {
            pubkey: address.to_bytes(),
            is_signer: true,
            is_writable: true,
        }
    }

    pub fn readonly_signer(address: &Address) -> Self {
        Self {
            pubkey: address.to_bytes(),
            is_signer: true,
            is_writable: false,
        }
    }

    pub fn writable(address: &Address) -> Self {
        Self {
            pubkey: address.to_bytes(),
            is_signer: false,
            is_writable: true,
        }
    }

    pub fn readonly(address: &Address) -> Self {
        Self {
            pubkey: address.to_bytes(),
            is_signer: false,
            is_writable: false,
        }
    }
}

/// A Solana instruction (before it is compiled into a transaction).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolInstruction {
    pub program_id: [u8; 32],
    pub accounts: Vec<SolAccountMeta>,
    pub data: Vec<u8>,
}

/// A compiled Solana transaction message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolTransaction {
    /// All account keys referenced by this transaction, in canonical order:
    ///   1. writable signers
    ///   2. read-only signers
    ///   3. writable non-signers
    ///   4. read-only non-signers
    pub account_keys: Vec<[u8; 32]>,

    /// Number of required signatures (first N accounts are signers).
    pub num_required_signatures: u8,
    /// How many of the signing accounts are read-only.
    pub num_readonly_signed: u8,
    /// How many of the non-signing accounts are read-only.
    pub num_readonly_unsigned: u8,

    pub recent_blockhash: [u8; 32],

    /// Compiled instructions (account references replaced with indices).
    pub compiled_instructions: Vec<CompiledInstruction>,
}

impl SolTransaction {
    /// The accounts that must sign, in signature-slot order.
    pub fn signer_keys(&self) -> &[[u8; 32]] {
        let n = (self.num_required_signatures as usize).min(self.account_keys.len());
        &self.account_keys[..n]
    }

    pub fn is_signer(&self, index: usize) -> bool {
        index < self.num_required_signatures as usize
    }

    pub fn is_writable(&self, index: usize) -> bool {
        let num_signers = self.num_required_signatures as usize;
        if index < num_signers {
            index < num_signers.saturating_sub(self.num_readonly_signed as usize)
        } else {
            index
                < self
                    .account_keys
                    .len()
                    .saturating_sub(self.num_readonly_unsigned as usize)
        }
    }

    /// Expand compiled instructions back into `SolInstruction`s.
    pub fn instructions(&self) -> Result<Vec<SolInstruction>, WireError> {
        let key = |index: u8| {
            self.account_keys
                .get(index as usize)
                .copied()
                .ok_or_else(|| {
                    WireError::SerializationError(format!("account index {index} out of range"))
                })
        };

        self.compiled_instructions
            .iter()
            .map(|cix| {
                let accounts = cix
                    .account_indices
                    .iter()
                    .map(|&i| {
                        Ok(SolAccountMeta {
                            pubkey: key(i)?,
                            is_signer: self.is_signer(i as usize),
                            is_writable: self.is_writable(i as usize),
                        })
                    })
                    .collect::<Result<Vec<_>, WireError>>()?;
                Ok(SolInstruction {
                    program_id: key(cix.program_id_index)?,
                    accounts,
                    data: cix.data.clone(),
                })
            })
            .collect()
    }
}

/// A compiled instruction where account references are replaced by u8 indices
/// into the transaction's `account_keys` array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub account_indices: Vec<u8>,
    pub data: Vec<u8>,
}

/// A transaction parsed back out of its wire format.
#[derive(Debug, Clone)]
pub struct DecodedTransaction {
    pub signatures: Vec<Signature>,
    pub message: SolTransaction,
    /// The exact bytes the signatures cover.
    pub message_bytes: Vec<u8>,
}

impl DecodedTransaction {
    /// Check every signature slot against its signer key.
    pub fn verify_signatures(&self) -> Result<(), WireError> {
        let signers = self.message.signer_keys();
        if signers.len() != self.signatures.len() {
            return Err(WireError::SigningError(format!(
                "{} signature slots for {} signers",
                self.signatures.len(),
                signers.len()
            )));
        }

        for (slot, (sig, key)) in self.signatures.iter().zip(signers).enumerate() {
            let signer = Address::new(*key);
            if sig.is_empty() {
                return Err(WireError::SigningError(format!(
                    "missing signature for {signer} (slot {slot})"
                )));
            }
            if !sig.verify(&signer, &self.message_bytes) {
                return Err(WireError::SigningError(format!(
                    "invalid signature for {signer} (slot {slot})"
                )));
            }
        }

        Ok(())
    }

    /// The fee payer's signature, which doubles as the transaction id.
    pub fn id(&self) -> Option<Signature> {
        self.signatures.first().copied()
    }
}

// ---------------------------------------------------------------------------
// Transaction building
// ---------------------------------------------------------------------------

/// Build a System Program `CreateAccount` instruction.
///
/// Both the payer and the new account must sign; the new account is assigned
/// to `owner_program` with `space` zeroed bytes.
pub fn build_create_account(
    payer: &Address,
    new_account: &Address,
    lamports: u64,
    space: u64,
    owner_program: &Address,
) -> SolInstruction {
    // u32 LE index (0 = CreateAccount) + u64 lamports + u64 space + owner.
    let mut data = Vec::with_capacity(52);
    data.extend_from_slice(&SYSTEM_CREATE_ACCOUNT_IX_INDEX.to_le_bytes());
    data.extend_from_slice(&lamports.to_le_bytes());
    data.extend_from_slice(&space.to_le_bytes());
    data.extend_from_slice(owner_program.as_bytes());

    SolInstruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![
            SolAccountMeta::writable_signer(payer),
            SolAccountMeta::writable_signer(new_account),
        ],
        data,
    }
}

/// Build a transaction from a set of instructions with a single fee payer.
///
/// The fee payer is always the first signer and is placed at index 0 in the
/// account keys. All instructions land in one message, so the ledger applies
/// them atomically.
pub fn compile_transaction(
    instructions: &[SolInstruction],
    fee_payer: &[u8; 32],
    recent_blockhash: &[u8; 32],
) -> Result<SolTransaction, WireError> {
    if instructions.is_empty() {
        return Err(WireError::TransactionBuildError(
            "transaction has no instructions".into(),
        ));
    }

    // Instruction account lists are tiny, so a Vec beats a map here.
    struct AccountEntry {
        pubkey: [u8; 32],
        is_signer: bool,
        is_writable: bool,
    }

    let mut entries: Vec<AccountEntry> = Vec::new();

    let mut upsert = |pubkey: [u8; 32], signer: bool, writable: bool| {
        if let Some(entry) = entries.iter_mut().find(|e| e.pubkey == pubkey) {
            entry.is_signer |= signer;
            entry.is_writable |= writable;
        } else {
            entries.push(AccountEntry {
                pubkey,
                is_signer: signer,
                is_writable: writable,
            });
        }
    };

    // Fee payer is always signer + writable.
    upsert(*fee_payer, true, true);

    for ix in instructions {
        for meta in &ix.accounts {
            upsert(meta.pubkey, meta.is_signer, meta.is_writable);
        }
        // Program IDs are non-signer, read-only accounts.
        upsert(ix.program_id, false, false);
    }

    if entries.len() > MAX_ACCOUNT_KEYS {
        return Err(WireError::TransactionBuildError(format!(
            "{} account keys exceed the {MAX_ACCOUNT_KEYS} limit",
            entries.len()
        )));
    }

    // Stable sort keeps insertion order within a category, so the fee payer
    // stays first among writable signers.
    entries.sort_by_key(|e| match (e.is_signer, e.is_writable) {
        (true, true) => 0u8,
        (true, false) => 1,
        (false, true) => 2,
        (false, false) => 3,
    });

    let num_signers = entries.iter().filter(|e| e.is_signer).count() as u8;
    let num_readonly_signed = entries
        .iter()
        .filter(|e| e.is_signer && !e.is_writable)
        .count() as u8;
    let num_readonly_unsigned = entries
        .iter()
        .filter(|e| !e.is_signer && !e.is_writable)
        .count() as u8;

    let account_keys: Vec<[u8; 32]> = entries.iter().map(|e| e.pubkey).collect();

    let index_of = |key: &[u8; 32], what: &str| {
        account_keys
            .iter()
            .position(|k| k == key)
            .map(|i| i as u8)
            .ok_or_else(|| WireError::TransactionBuildError(format!("{what} not in account keys")))
    };

    let mut compiled = Vec::with_capacity(instructions.len());
    for ix in instructions {
        let program_id_index = index_of(&ix.program_id, "program_id")?;
        let account_indices = ix
            .accounts
            .iter()
            .map(|meta| index_of(&meta.pubkey, "account"))
            .collect::<Result<Vec<u8>, WireError>>()?;

        compiled.push(CompiledInstruction {
            program_id_index,
            account_indices,
            data: ix.data.clone(),
        });
    }

    Ok(SolTransaction {
        account_keys,
        num_required_signatures: num_signers,
        num_readonly_signed,
        num_readonly_unsigned,
        recent_blockhash: *recent_blockhash,
        compiled_instructions: compiled,
    })
}

/// Serialize the transaction message (the bytes that get signed).
pub fn serialize_message(tx: &SolTransaction) -> Result<Vec<u8>, WireError> {
    let mut buf = Vec::with_capacity(256);

    buf.push(tx.num_required_signatures);
    buf.push(tx.num_readonly_signed);
    buf.push(tx.num_readonly_unsigned);

    buf.extend_from_slice(&encode_compact_u16(compact_len(tx.account_keys.len())?));
    for key in &tx.account_keys {
        buf.extend_from_slice(key);
    }

    buf.extend_from_slice(&tx.recent_blockhash);

    buf.extend_from_slice(&encode_compact_u16(compact_len(
        tx.compiled_instructions.len(),
    )?));
    for ix in &tx.compiled_instructions {
        buf.push(ix.program_id_index);

        buf.extend_from_slice(&encode_compact_u16(compact_len(ix.account_indices.len())?));
        buf.extend_from_slice(&ix.account_indices);

        buf.extend_from_slice(&encode_compact_u16(compact_len(ix.data.len())?));
        buf.extend_from_slice(&ix.data);
    }

    Ok(buf)
}

/// Serialize a transaction with every signature slot zeroed, ready to be
/// passed around signers.
pub fn unsigned_wire(tx: &SolTransaction) -> Result<Vec<u8>, WireError> {
    let message_bytes = serialize_message(tx)?;
    let num_sigs = tx.num_required_signatures as usize;

    let mut wire = Vec::with_capacity(3 + 64 * num_sigs + message_bytes.len());
    wire.extend_from_slice(&encode_compact_u16(num_sigs as u16));
    wire.resize(wire.len() + 64 * num_sigs, 0);
    wire.extend_from_slice(&message_bytes);

    Ok(wire)
}

/// Fill `keypair`'s signature slot in a wire-format transaction.
///
/// The transaction may be unsigned, partially signed, or fully signed; only
/// the slot matching the keypair's address is written. Fails if the keypair
/// is not one of the transaction's signers.
pub fn sign_raw_transaction(keypair: &Keypair, raw_tx: &[u8]) -> Result<Vec<u8>, WireError> {
    let our_pubkey = keypair.address().to_bytes();
    let layout = WireLayout::parse(raw_tx)?;

    let signer_idx = layout
        .signer_keys(raw_tx)
        .position(|key| key == our_pubkey)
        .ok_or_else(|| {
            WireError::SigningError(format!(
                "{} not found in transaction signers",
                keypair.address()
            ))
        })?;

    let signature = keypair.sign(&raw_tx[layout.message_start..]);

    let mut signed_tx = raw_tx.to_vec();
    let sig_offset = layout.sigs_start + signer_idx * 64;
    signed_tx[sig_offset..sig_offset + 64].copy_from_slice(&signature.to_bytes());

    Ok(signed_tx)
}

/// Parse a wire-format transaction into signatures and message.
pub fn decode_transaction(raw_tx: &[u8]) -> Result<DecodedTransaction, WireError> {
    let layout = WireLayout::parse(raw_tx)?;

    let signatures = raw_tx[layout.sigs_start..layout.message_start]
        .chunks_exact(64)
        .map(|chunk| {
            let mut sig = [0u8; 64];
            sig.copy_from_slice(chunk);
            Signature::new(sig)
        })
        .collect();

    let message_bytes = raw_tx[layout.message_start..].to_vec();
    let mut reader = Reader::new(&message_bytes[layout.accounts_end - layout.message_start..]);

    let recent_blockhash = reader.array::<32>()?;
    let num_instructions = reader.compact_u16()? as usize;

    let mut compiled_instructions = Vec::with_capacity(num_instructions);
    for _ in 0..num_instructions {
        let program_id_index = reader.u8()?;
        let n_accounts = reader.compact_u16()? as usize;
        let account_indices = reader.bytes(n_accounts)?.to_vec();
        let data_len = reader.compact_u16()? as usize;
        let data = reader.bytes(data_len)?.to_vec();
        compiled_instructions.push(CompiledInstruction {
            program_id_index,
            account_indices,
            data,
        });
    }

    if !reader.is_empty() {
        return Err(WireError::SerializationError(
            "trailing bytes after message".into(),
        ));
    }

    let account_keys = layout.account_keys(raw_tx).collect();

    Ok(DecodedTransaction {
        signatures,
        message: SolTransaction {
            account_keys,
            num_required_signatures: raw_tx[layout.message_start],
            num_readonly_signed: raw_tx[layout.message_start + 1],
            num_readonly_unsigned: raw_tx[layout.message_start + 2],
            recent_blockhash,
            compiled_instructions,
        },
        message_bytes,
    })
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn compact_len(len: usize) -> Result<u16, WireError> {
    u16::try_from(len).map_err(|_| {
        WireError::SerializationError(format!("length {len} does not fit compact-u16"))
    })
}

/// Byte offsets of the fixed parts of a wire-format transaction.
struct WireLayout {
    sigs_start: usize,
    message_start: usize,
    accounts_start: usize,
    accounts_end: usize,
    num_required_sigs: usize,
}

impl WireLayout {
    fn parse(raw_tx: &[u8]) -> Result<Self, WireError> {
        // compact-u16(num_signatures) | 64-byte signatures * N | message
        let (num_sigs, compact_len) = decode_compact_u16(raw_tx)?;

        if num_sigs == 0 {
            return Err(WireError::TransactionBuildError(
                "transaction has zero signatures".into(),
            ));
        }

        let sigs_start = compact_len;
        let message_start = sigs_start + (num_sigs as usize) * 64;

        if message_start + 4 > raw_tx.len() {
            return Err(WireError::SerializationError(
                "transaction too short: signature slots exceed length".into(),
            ));
        }

        // Header: num_required_signatures | num_readonly_signed | num_readonly_unsigned
        let num_required_sigs = raw_tx[message_start] as usize;
        if num_required_sigs != num_sigs as usize {
            return Err(WireError::SerializationError(format!(
                "{num_sigs} signature slots but header requires {num_required_sigs}"
            )));
        }

        let (num_accounts, accounts_compact_len) =
            decode_compact_u16(&raw_tx[message_start + 3..])?;
        let accounts_start = message_start + 3 + accounts_compact_len;
        let accounts_end = accounts_start + (num_accounts as usize) * 32;

        if accounts_end > raw_tx.len() {
            return Err(WireError::SerializationError(
                "transaction message too short for account keys".into(),
            ));
        }
        if num_required_sigs > num_accounts as usize {
            return Err(WireError::SerializationError(
                "more required signatures than account keys".into(),
            ));
        }

        Ok(Self {
            sigs_start,
            message_start,
            accounts_start,
            accounts_end,
            num_required_sigs,
        })
    }

    fn account_keys<'a>(&self, raw_tx: &'a [u8]) -> impl Iterator<Item = [u8; 32]> + 'a {
        raw_tx[self.accounts_start..self.accounts_end]
            .chunks_exact(32)
            .map(|chunk| {
                let mut key = [0u8; 32];
                key.copy_from_slice(chunk);
                key
            })
    }

    fn signer_keys<'a>(&self, raw_tx: &'a [u8]) -> impl Iterator<Item = [u8; 32]> + 'a {
        self.account_keys(raw_tx).take(self.num_required_sigs)
    }
}

/// Cursor over message bytes with bounds-checked reads.
struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if n > self.data.len() {
            return Err(WireError::SerializationError(
                "unexpected end of transaction message".into(),
            ));
        }
        let (head, tail) = self.data.split_at(n);
        self.data = tail;
        Ok(head)
    }

    fn u8(&mut self) -> Result<u8, WireError> {
        Ok(self.bytes(1)?[0])
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    fn compact_u16(&mut self) -> Result<u16, WireError> {
        let (value, used) = decode_compact_u16(self.data)?;
        self.data = &self.data[used..];
        Ok(value)
    }

    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
