//! In-process ledger for driving the token client end to end.
//!
//! `MemoryLedger` decodes each submitted wire transaction, checks every
//! signature, then runs its System / Associated Token Account / Token-2022
//! instructions against a copy of the account map, committing only when all
//! of them succeed.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use spl_wire::metadata::{parse_initialize_args, INITIALIZE_DISCRIMINATOR};
use spl_wire::state::{
    metadata_pointer, mint_metadata, push_extension, EXTENSION_METADATA_POINTER,
    EXTENSION_TOKEN_METADATA,
};
use spl_wire::token::{ACCOUNT_BASE_LEN, MINT_BASE_LEN};
use spl_wire::{
    decode_transaction, derive_associated_token_address, DecodedTransaction, MintState,
    SolInstruction, TokenAccountState, TokenMetadata, ASSOCIATED_TOKEN_PROGRAM_ID,
    SYSTEM_PROGRAM_ID, TOKEN_2022_PROGRAM_ID,
};
use token_kit::{
    Address, ClientConfig, Cluster, Commitment, Keypair, KeypairSigner, LedgerAccount,
    LedgerError, LedgerRpc, RecentBlockhash, Signature, TokenClient, LAMPORTS_PER_SOL,
};

pub const BLOCKHASH: [u8; 32] = [0xab; 32];

/// Rent-exempt minimum for `len` bytes of account data.
pub fn rent(len: usize) -> u64 {
    (len as u64 + 128) * 6_960
}

#[derive(Default)]
pub struct MemoryLedger {
    accounts: RefCell<HashMap<Address, LedgerAccount>>,
    sent: RefCell<Vec<DecodedTransaction>>,
    landed: RefCell<Vec<Signature>>,
    calls: Cell<usize>,
    offline: Cell<bool>,
    confirmations_left: Cell<Option<usize>>,
    airdrops: Cell<u8>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fund(&self, address: &Address, lamports: u64) {
        let mut accounts = self.accounts.borrow_mut();
        let account = accounts.entry(*address).or_insert_with(|| LedgerAccount {
            lamports: 0,
            owner: Address::new(SYSTEM_PROGRAM_ID),
            data: Vec::new(),
            executable: false,
        });
        account.lamports += lamports;
    }

    pub fn account(&self, address: &Address) -> Option<LedgerAccount> {
        self.accounts.borrow().get(address).cloned()
    }

    /// Every transaction that reached the ledger, landed or not.
    pub fn sent(&self) -> Vec<DecodedTransaction> {
        self.sent.borrow().clone()
    }

    /// Number of ledger calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.set(offline);
    }

    /// Let `n` more confirmations succeed, then report expiry.
    pub fn expire_after_confirmations(&self, n: usize) {
        self.confirmations_left.set(Some(n));
    }

    fn touch(&self) -> Result<(), LedgerError> {
        self.calls.set(self.calls.get() + 1);
        if self.offline.get() {
            return Err(LedgerError::Transport("connection refused".into()));
        }
        Ok(())
    }
}

impl LedgerRpc for MemoryLedger {
    async fn get_account(
        &self,
        address: &Address,
        _commitment: Commitment,
    ) -> Result<Option<LedgerAccount>, LedgerError> {
        self.touch()?;
        Ok(self.account(address))
    }

    async fn get_balance(
        &self,
        address: &Address,
        _commitment: Commitment,
    ) -> Result<u64, LedgerError> {
        self.touch()?;
        Ok(self.account(address).map_or(0, |a| a.lamports))
    }

    async fn get_latest_blockhash(
        &self,
        _commitment: Commitment,
    ) -> Result<RecentBlockhash, LedgerError> {
        self.touch()?;
        Ok(RecentBlockhash {
            blockhash: BLOCKHASH,
            last_valid_block_height: 150,
        })
    }

    async fn get_minimum_balance_for_rent_exemption(
        &self,
        data_len: usize,
    ) -> Result<u64, LedgerError> {
        self.touch()?;
        Ok(rent(data_len))
    }

    async fn send_transaction(&self, wire: &[u8]) -> Result<Signature, LedgerError> {
        self.touch()?;

        let tx = decode_transaction(wire).map_err(|e| LedgerError::Rpc {
            code: -32602,
            message: e.to_string(),
        })?;
        tx.verify_signatures().map_err(|e| LedgerError::Rpc {
            code: -32003,
            message: format!("signature verification failure: {e}"),
        })?;
        self.sent.borrow_mut().push(tx.clone());

        if tx.message.recent_blockhash != BLOCKHASH {
            return Err(LedgerError::TransactionFailed("BlockhashNotFound".into()));
        }
        let instructions = tx
            .message
            .instructions()
            .map_err(|e| LedgerError::TransactionFailed(e.to_string()))?;

        let mut accounts = self.accounts.borrow().clone();
        for (index, ix) in instructions.iter().enumerate() {
            execute(&mut accounts, ix).map_err(|fault| fault.at(index as u8))?;
        }
        *self.accounts.borrow_mut() = accounts;

        let id = tx.signatures[0];
        self.landed.borrow_mut().push(id);
        Ok(id)
    }

    async fn confirm_transaction(
        &self,
        signature: &Signature,
        _blockhash: &RecentBlockhash,
        _commitment: Commitment,
    ) -> Result<(), LedgerError> {
        self.touch()?;
        if let Some(left) = self.confirmations_left.get() {
            if left == 0 {
                return Err(LedgerError::BlockhashExpired);
            }
            self.confirmations_left.set(Some(left - 1));
        }
        if self.landed.borrow().contains(signature) {
            Ok(())
        } else {
            Err(LedgerError::TransactionFailed("transaction not found".into()))
        }
    }

    async fn request_airdrop(
        &self,
        address: &Address,
        lamports: u64,
    ) -> Result<Signature, LedgerError> {
        self.touch()?;
        let n = self.airdrops.get() + 1;
        self.airdrops.set(n);

        self.fund(address, lamports);
        let signature = Signature::new([n; 64]);
        self.landed.borrow_mut().push(signature);
        Ok(signature)
    }
}

/// A ledger that must never be reached.
pub struct NoNetwork;

impl LedgerRpc for NoNetwork {
    async fn get_account(
        &self,
        address: &Address,
        _: Commitment,
    ) -> Result<Option<LedgerAccount>, LedgerError> {
        panic!("unexpected get_account({address})")
    }

    async fn get_balance(&self, address: &Address, _: Commitment) -> Result<u64, LedgerError> {
        panic!("unexpected get_balance({address})")
    }

    async fn get_latest_blockhash(&self, _: Commitment) -> Result<RecentBlockhash, LedgerError> {
        panic!("unexpected get_latest_blockhash")
    }

    async fn get_minimum_balance_for_rent_exemption(&self, _: usize) -> Result<u64, LedgerError> {
        panic!("unexpected get_minimum_balance_for_rent_exemption")
    }

    async fn send_transaction(&self, _: &[u8]) -> Result<Signature, LedgerError> {
        panic!("unexpected send_transaction")
    }

    async fn confirm_transaction(
        &self,
        _: &Signature,
        _: &RecentBlockhash,
        _: Commitment,
    ) -> Result<(), LedgerError> {
        panic!("unexpected confirm_transaction")
    }

    async fn request_airdrop(&self, _: &Address, _: u64) -> Result<Signature, LedgerError> {
        panic!("unexpected request_airdrop")
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn memory_client() -> TokenClient<MemoryLedger> {
    TokenClient::new(MemoryLedger::new(), &ClientConfig::for_cluster(Cluster::Devnet))
}

pub fn offline_client(cluster: Cluster) -> TokenClient<NoNetwork> {
    TokenClient::new(NoNetwork, &ClientConfig::for_cluster(cluster))
}

/// A signer with 10 SOL on `ledger`.
pub fn funded_signer(ledger: &MemoryLedger, seed: u8) -> KeypairSigner {
    let signer = KeypairSigner::new(Keypair::from_seed(&[seed; 32]));
    ledger.fund(&signer.keypair().address(), 10 * LAMPORTS_PER_SOL);
    signer
}

/// Program ids of a landed transaction's instructions, in order.
pub fn program_ids(tx: &DecodedTransaction) -> Vec<Address> {
    tx.message
        .instructions()
        .unwrap()
        .iter()
        .map(|ix| Address::new(ix.program_id))
        .collect()
}

// ---------------------------------------------------------------------------
// Instruction execution
// ---------------------------------------------------------------------------

enum Fault {
    Custom(u32),
    Named(&'static str),
}

impl Fault {
    fn at(self, index: u8) -> LedgerError {
        match self {
            Fault::Custom(code) => LedgerError::InstructionFailed {
                index,
                custom: Some(code),
                message: format!("custom program error: {code:#x}"),
            },
            Fault::Named(name) => LedgerError::InstructionFailed {
                index,
                custom: None,
                message: name.to_string(),
            },
        }
    }
}

type Accounts = HashMap<Address, LedgerAccount>;

fn key(ix: &SolInstruction, i: usize) -> Result<Address, Fault> {
    ix.accounts
        .get(i)
        .map(|meta| Address::new(meta.pubkey))
        .ok_or(Fault::Named("NotEnoughAccountKeys"))
}

fn require_signer(ix: &SolInstruction, i: usize) -> Result<(), Fault> {
    match ix.accounts.get(i) {
        Some(meta) if meta.is_signer => Ok(()),
        _ => Err(Fault::Named("MissingRequiredSignature")),
    }
}

fn debit(accounts: &mut Accounts, payer: &Address, lamports: u64) -> Result<(), Fault> {
    let account = accounts
        .get_mut(payer)
        .ok_or(Fault::Named("AccountNotFound"))?;
    account.lamports = account.lamports.checked_sub(lamports).ok_or(Fault::Custom(1))?;
    Ok(())
}

fn read_u64(bytes: &[u8]) -> u64 {
    u64::from_le_bytes(bytes.try_into().unwrap())
}

fn read_address(bytes: &[u8]) -> Address {
    Address::new(bytes.try_into().unwrap())
}

fn execute(accounts: &mut Accounts, ix: &SolInstruction) -> Result<(), Fault> {
    let program = Address::new(ix.program_id);
    if program == Address::new(SYSTEM_PROGRAM_ID) {
        create_account(accounts, ix)
    } else if program == ASSOCIATED_TOKEN_PROGRAM_ID {
        create_holding_account(accounts, ix)
    } else if program == TOKEN_2022_PROGRAM_ID {
        token_instruction(accounts, ix)
    } else {
        Err(Fault::Named("UnsupportedProgramId"))
    }
}

fn create_account(accounts: &mut Accounts, ix: &SolInstruction) -> Result<(), Fault> {
    let data = &ix.data;
    if data.len() != 52 || data[0..4] != [0u8; 4] {
        return Err(Fault::Named("InvalidInstructionData"));
    }
    let lamports = read_u64(&data[4..12]);
    let space = read_u64(&data[12..20]) as usize;
    let owner = read_address(&data[20..52]);

    let payer = key(ix, 0)?;
    let new_account = key(ix, 1)?;
    require_signer(ix, 0)?;
    require_signer(ix, 1)?;

    if accounts.contains_key(&new_account) {
        return Err(Fault::Custom(0));
    }
    debit(accounts, &payer, lamports)?;
    accounts.insert(
        new_account,
        LedgerAccount {
            lamports,
            owner,
            data: vec![0; space],
            executable: false,
        },
    );
    Ok(())
}

fn create_holding_account(accounts: &mut Accounts, ix: &SolInstruction) -> Result<(), Fault> {
    let payer = key(ix, 0)?;
    let account = key(ix, 1)?;
    let owner = key(ix, 2)?;
    let mint = key(ix, 3)?;
    let token_program = key(ix, 5)?;
    require_signer(ix, 0)?;

    let expected = derive_associated_token_address(&owner, &mint, &token_program)
        .map_err(|_| Fault::Named("InvalidSeeds"))?;
    if expected != account {
        return Err(Fault::Named("InvalidSeeds"));
    }
    // A lamports-only account at the address is adopted, not refused.
    let prefunded = match accounts.get(&account) {
        Some(existing)
            if existing.owner == Address::new(SYSTEM_PROGRAM_ID) && existing.data.is_empty() =>
        {
            existing.lamports
        }
        Some(_) => return Err(Fault::Custom(0)),
        None => 0,
    };
    let mint_account = accounts
        .get(&mint)
        .ok_or(Fault::Named("InvalidAccountData"))?;
    MintState::unpack(&mint_account.data).map_err(|_| Fault::Named("InvalidAccountData"))?;

    let lamports = rent(ACCOUNT_BASE_LEN);
    debit(accounts, &payer, lamports.saturating_sub(prefunded))?;

    let state = TokenAccountState {
        mint,
        owner,
        amount: 0,
        delegate: None,
        is_frozen: false,
    };
    accounts.insert(
        account,
        LedgerAccount {
            lamports: lamports.max(prefunded),
            owner: TOKEN_2022_PROGRAM_ID,
            data: state.pack().to_vec(),
            executable: false,
        },
    );
    Ok(())
}

fn token_instruction(accounts: &mut Accounts, ix: &SolInstruction) -> Result<(), Fault> {
    if ix.data.starts_with(&INITIALIZE_DISCRIMINATOR) {
        return initialize_metadata(accounts, ix);
    }
    match ix.data.first() {
        Some(39) => initialize_pointer(accounts, ix),
        Some(20) => initialize_mint(accounts, ix),
        Some(14) => mint_to(accounts, ix),
        _ => Err(Fault::Named("InvalidInstructionData")),
    }
}

fn token_account<'a>(
    accounts: &'a mut Accounts,
    address: &Address,
) -> Result<&'a mut LedgerAccount, Fault> {
    let account = accounts
        .get_mut(address)
        .ok_or(Fault::Named("UninitializedAccount"))?;
    if account.owner != TOKEN_2022_PROGRAM_ID {
        return Err(Fault::Named("IncorrectProgramId"));
    }
    Ok(account)
}

fn initialize_pointer(accounts: &mut Accounts, ix: &SolInstruction) -> Result<(), Fault> {
    if ix.data.len() != 66 || ix.data[1] != 0 {
        return Err(Fault::Named("InvalidInstructionData"));
    }
    let mint = token_account(accounts, &key(ix, 0)?)?;
    if mint.data.len() < spl_wire::token::mint_len_with_metadata_pointer() || mint.data[45] != 0 {
        return Err(Fault::Named("InvalidAccountData"));
    }

    let mut data = vec![0u8; MINT_BASE_LEN];
    push_extension(&mut data, true, EXTENSION_METADATA_POINTER, &ix.data[2..66]);
    mint.data = data;
    Ok(())
}

fn initialize_mint(accounts: &mut Accounts, ix: &SolInstruction) -> Result<(), Fault> {
    let data = &ix.data;
    if data.len() < 35 {
        return Err(Fault::Named("InvalidInstructionData"));
    }
    let mint = token_account(accounts, &key(ix, 0)?)?;
    if mint.data.len() < MINT_BASE_LEN {
        return Err(Fault::Named("InvalidAccountData"));
    }
    if mint.data[45] == 1 {
        return Err(Fault::Custom(6));
    }
    if mint.lamports < rent(mint.data.len()) {
        return Err(Fault::Custom(0));
    }

    let state = MintState {
        mint_authority: Some(read_address(&data[2..34])),
        supply: 0,
        decimals: data[1],
        is_initialized: true,
        freeze_authority: (data[34] == 1).then(|| read_address(&data[35..67])),
    };
    mint.data[..MINT_BASE_LEN].copy_from_slice(&state.pack());
    Ok(())
}

fn initialize_metadata(accounts: &mut Accounts, ix: &SolInstruction) -> Result<(), Fault> {
    let metadata_address = key(ix, 0)?;
    let update_authority = key(ix, 1)?;
    let mint_address = key(ix, 2)?;
    let mint_authority = key(ix, 3)?;
    require_signer(ix, 3)?;
    if metadata_address != mint_address {
        return Err(Fault::Named("InvalidAccountData"));
    }

    let (name, symbol, uri) =
        parse_initialize_args(&ix.data).ok_or(Fault::Named("InvalidInstructionData"))?;

    let mint = token_account(accounts, &mint_address)?;
    let state = MintState::unpack(&mint.data).map_err(|_| Fault::Named("UninitializedAccount"))?;
    if state.mint_authority != Some(mint_authority) {
        return Err(Fault::Custom(4));
    }
    if metadata_pointer(&mint.data).ok().flatten() != Some(mint_address) {
        return Err(Fault::Named("InvalidAccountData"));
    }
    if !matches!(mint_metadata(&mint.data), Ok(None)) {
        return Err(Fault::Named("AccountAlreadyInitialized"));
    }

    let metadata = TokenMetadata {
        update_authority,
        mint: mint_address,
        name,
        symbol,
        uri,
        additional_metadata: Vec::new(),
    };
    let packed = metadata.pack().map_err(|_| Fault::Named("InvalidAccountData"))?;
    push_extension(&mut mint.data, true, EXTENSION_TOKEN_METADATA, &packed);

    if mint.lamports < rent(mint.data.len()) {
        return Err(Fault::Named("InsufficientFundsForRent"));
    }
    Ok(())
}

fn mint_to(accounts: &mut Accounts, ix: &SolInstruction) -> Result<(), Fault> {
    let data = &ix.data;
    if data.len() != 10 {
        return Err(Fault::Named("InvalidInstructionData"));
    }
    let amount = read_u64(&data[1..9]);
    let decimals = data[9];

    let mint_address = key(ix, 0)?;
    let destination = key(ix, 1)?;
    let authority = key(ix, 2)?;
    require_signer(ix, 2)?;

    let mint = token_account(accounts, &mint_address)?;
    let mut mint_state =
        MintState::unpack(&mint.data).map_err(|_| Fault::Named("UninitializedAccount"))?;
    match mint_state.mint_authority {
        None => return Err(Fault::Custom(5)),
        Some(current) if current != authority => return Err(Fault::Custom(4)),
        Some(_) => {}
    }
    if decimals != mint_state.decimals {
        return Err(Fault::Custom(18));
    }
    mint_state.supply = mint_state.supply.checked_add(amount).ok_or(Fault::Custom(14))?;
    mint.data[..MINT_BASE_LEN].copy_from_slice(&mint_state.pack());

    let holding = token_account(accounts, &destination)?;
    let mut holding_state =
        TokenAccountState::unpack(&holding.data).map_err(|_| Fault::Named("InvalidAccountData"))?;
    if holding_state.mint != mint_address {
        return Err(Fault::Custom(3));
    }
    holding_state.amount = holding_state.amount.checked_add(amount).ok_or(Fault::Custom(14))?;
    holding.data[..ACCOUNT_BASE_LEN].copy_from_slice(&holding_state.pack());
    Ok(())
}
