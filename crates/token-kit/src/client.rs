//! Token operations against a remote ledger.
//!
//! Every mutating call follows the same path: build the instructions, set
//! the signer as fee payer, fetch a recent blockhash, co-sign with any fresh
//! keypair, let the signer authorize and submit, then wait for confirmation.
//! Signatures are only returned once confirmed.

use std::fmt;

use log::{debug, info, warn};
use spl_wire::metadata::initialize_token_metadata;
use spl_wire::pda::is_on_curve;
use spl_wire::state::mint_metadata;
use spl_wire::token::{
    create_associated_token_account, initialize_metadata_pointer, initialize_mint2,
    mint_len_with_metadata_pointer, mint_to_checked,
};
use spl_wire::{
    build_create_account, compile_transaction, derive_associated_token_address,
    sign_raw_transaction, unsigned_wire, Address, IntoAddress, Keypair, MintState, Signature,
    SolInstruction, TokenAccountState, TokenMetadata, SYSTEM_PROGRAM_ID, TOKEN_2022_PROGRAM_ID,
};

use crate::cluster::{Cluster, ClientConfig};
use crate::error::{classify_ledger_error, TokenError};
use crate::ledger::{Commitment, LedgerAccount, LedgerRpc, RecentBlockhash};
use crate::signer::{SubmitError, TransactionSigner};
use crate::units::{from_base_units, lamports_to_sol, sol_to_lamports, to_base_units, UiAmount};

/// Decimals given to newly launched tokens unless overridden.
pub const DEFAULT_DECIMALS: u8 = 9;

/// Longest accepted token symbol, in characters.
pub const MAX_SYMBOL_LEN: usize = 10;

/// Derive the holding account for `(mint, owner)` under `program_id`.
///
/// Pure and deterministic; accepts raw addresses or their Base58 strings.
/// The owner must be a wallet key on the Ed25519 curve: program-derived
/// owners are rejected with `InvalidAddress`.
pub fn derive_holding_address(
    mint: impl IntoAddress,
    owner: impl IntoAddress,
    program_id: impl IntoAddress,
) -> Result<Address, TokenError> {
    let mint = mint.into_address()?;
    let owner = owner.into_address()?;
    let program_id = program_id.into_address()?;
    if !is_on_curve(owner.as_bytes()) {
        return Err(TokenError::InvalidAddress(format!(
            "owner {owner} is not an Ed25519 public key"
        )));
    }
    Ok(derive_associated_token_address(&owner, &mint, &program_id)?)
}

/// Holding account under the Token-2022 program, the one this client uses.
pub fn holding_address(mint: impl IntoAddress, owner: impl IntoAddress) -> Result<Address, TokenError> {
    derive_holding_address(mint, owner, TOKEN_2022_PROGRAM_ID)
}

// ---------------------------------------------------------------------------
// Query results
// ---------------------------------------------------------------------------

/// A mint as read from the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintInfo {
    pub address: Address,
    pub decimals: u8,
    /// Total supply in display units.
    pub supply: UiAmount,
    pub supply_base_units: u64,
    /// `None` means no further supply can ever be issued.
    pub mint_authority: Option<Address>,
    pub freeze_authority: Option<Address>,
    pub metadata: Option<TokenMetadata>,
}

/// Balance of a holding account. A holding account that was never created
/// is `NotFound`, which reads as a zero balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoldingBalance {
    Found {
        account: Address,
        owner: Address,
        amount: UiAmount,
        base_units: u64,
    },
    NotFound {
        account: Address,
    },
}

impl HoldingBalance {
    pub fn account(&self) -> Address {
        match self {
            HoldingBalance::Found { account, .. } | HoldingBalance::NotFound { account } => *account,
        }
    }

    pub fn exists(&self) -> bool {
        matches!(self, HoldingBalance::Found { .. })
    }

    pub fn amount(&self) -> UiAmount {
        match self {
            HoldingBalance::Found { amount, .. } => *amount,
            HoldingBalance::NotFound { .. } => UiAmount::ZERO,
        }
    }

    pub fn base_units(&self) -> u64 {
        match self {
            HoldingBalance::Found { base_units, .. } => *base_units,
            HoldingBalance::NotFound { .. } => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintToOptions {
    /// Create the recipient's holding account in the same transaction when
    /// it does not exist yet.
    pub create_if_missing: bool,
}

impl Default for MintToOptions {
    fn default() -> Self {
        Self {
            create_if_missing: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Token launch
// ---------------------------------------------------------------------------

/// Parameters for a new token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewToken {
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub decimals: u8,
    /// Minted to the signer right after the mint is confirmed; zero skips it.
    pub initial_supply: UiAmount,
}

impl NewToken {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            uri: uri.into(),
            decimals: DEFAULT_DECIMALS,
            initial_supply: UiAmount::ZERO,
        }
    }

    pub fn with_decimals(mut self, decimals: u8) -> Self {
        self.decimals = decimals;
        self
    }

    pub fn with_initial_supply(mut self, supply: UiAmount) -> Self {
        self.initial_supply = supply;
        self
    }

    pub fn validate(&self) -> Result<(), TokenError> {
        if self.name.trim().is_empty() {
            return Err(TokenError::InvalidMetadata("name must not be empty".into()));
        }

        let symbol_len = self.symbol.trim().chars().count();
        if symbol_len == 0 || symbol_len > MAX_SYMBOL_LEN {
            return Err(TokenError::InvalidMetadata(format!(
                "symbol must be 1 to {MAX_SYMBOL_LEN} characters"
            )));
        }

        if !(self.uri.starts_with("https://") || self.uri.starts_with("http://")) {
            return Err(TokenError::InvalidMetadata(
                "uri must start with http:// or https://".into(),
            ));
        }

        Ok(())
    }
}

/// How far a launch got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LaunchState {
    Unstarted,
    MintAccountSubmitted,
    MintAccountConfirmed,
    SupplyMintSubmitted,
    SupplyMintConfirmed,
}

impl fmt::Display for LaunchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LaunchState::Unstarted => "unstarted",
            LaunchState::MintAccountSubmitted => "mint account submitted",
            LaunchState::MintAccountConfirmed => "mint account confirmed",
            LaunchState::SupplyMintSubmitted => "supply mint submitted",
            LaunchState::SupplyMintConfirmed => "supply mint confirmed",
        };
        f.write_str(name)
    }
}

/// A launch whose mint exists on the ledger.
///
/// When the initial supply could not be minted, `state` stops short of
/// `SupplyMintConfirmed` and `supply_error` says why. The mint is still
/// usable; the supply can be minted later with `mint_to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenLaunch {
    pub mint: Address,
    pub state: LaunchState,
    pub mint_signature: Signature,
    pub supply_signature: Option<Signature>,
    pub supply_error: Option<TokenError>,
}

/// A launch that never produced a confirmed mint.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("token launch halted ({state}): {source}")]
pub struct LaunchError {
    pub state: LaunchState,
    /// Address of the mint keypair, once one was generated.
    pub mint: Option<Address>,
    pub mint_signature: Option<Signature>,
    #[source]
    pub source: TokenError,
}

impl LaunchError {
    fn unstarted(mint: Option<Address>, source: TokenError) -> Self {
        Self {
            state: LaunchState::Unstarted,
            mint,
            mint_signature: None,
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Token operations over a `LedgerRpc`.
pub struct TokenClient<L> {
    ledger: L,
    cluster: Cluster,
    commitment: Commitment,
}

impl<L: LedgerRpc> TokenClient<L> {
    pub fn new(ledger: L, config: &ClientConfig) -> Self {
        Self {
            ledger,
            cluster: config.cluster,
            commitment: config.commitment,
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn cluster(&self) -> Cluster {
        self.cluster
    }

    /// Read a mint. `Ok(None)` means no account exists at that address.
    pub async fn get_mint_info(&self, mint: impl IntoAddress) -> Result<Option<MintInfo>, TokenError> {
        let mint = mint.into_address()?;

        let Some(account) = self.ledger.get_account(&mint, self.commitment).await? else {
            return Ok(None);
        };
        if account.owner != TOKEN_2022_PROGRAM_ID {
            return Err(TokenError::InvalidAccountData(format!(
                "{mint} is owned by {}, not the token program",
                account.owner
            )));
        }

        let state = MintState::unpack(&account.data)?;
        let metadata = mint_metadata(&account.data)?;

        Ok(Some(MintInfo {
            address: mint,
            decimals: state.decimals,
            supply: from_base_units(state.supply, state.decimals),
            supply_base_units: state.supply,
            mint_authority: state.mint_authority,
            freeze_authority: state.freeze_authority,
            metadata,
        }))
    }

    /// Read a holding account's balance, scaled by `decimals`.
    pub async fn get_holding_balance(
        &self,
        account: impl IntoAddress,
        decimals: u8,
    ) -> Result<HoldingBalance, TokenError> {
        let account = account.into_address()?;

        let Some(data) = self.holding_account(&account).await? else {
            debug!("holding account {account} not found");
            return Ok(HoldingBalance::NotFound { account });
        };
        if data.owner != TOKEN_2022_PROGRAM_ID {
            return Err(TokenError::InvalidAccountData(format!(
                "{account} is owned by {}, not the token program",
                data.owner
            )));
        }

        let state = TokenAccountState::unpack(&data.data)?;
        Ok(HoldingBalance::Found {
            account,
            owner: state.owner,
            amount: from_base_units(state.amount, decimals),
            base_units: state.amount,
        })
    }

    /// Balance of `owner`'s holding account for `mint`, using the mint's own
    /// decimals. Fails with `AccountMissing` when the mint does not exist.
    pub async fn get_owner_balance(
        &self,
        mint: impl IntoAddress,
        owner: impl IntoAddress,
    ) -> Result<HoldingBalance, TokenError> {
        let mint = mint.into_address()?;
        let account = holding_address(mint, owner)?;

        let info = self
            .get_mint_info(mint)
            .await?
            .ok_or(TokenError::AccountMissing { account: mint })?;
        self.get_holding_balance(account, info.decimals).await
    }

    /// Create `owner`'s holding account for `mint`, paid by `signer`.
    ///
    /// Fails with `AlreadyExists` when the account is already there; callers
    /// wanting create-or-skip should treat that as success.
    pub async fn ensure_holding_account<S: TransactionSigner>(
        &self,
        signer: &S,
        mint: impl IntoAddress,
        owner: impl IntoAddress,
    ) -> Result<Signature, TokenError> {
        let mint = mint.into_address()?;
        let owner = owner.into_address()?;
        let account = holding_address(mint, owner)?;

        if self.holding_account(&account).await?.is_some() {
            return Err(TokenError::AlreadyExists { account });
        }

        let ix = create_associated_token_account(&signer.address(), &account, &owner, &mint);
        self.submit(signer, vec![ix], None).await
    }

    /// Mint `amount` display units of `mint` to `recipient`.
    ///
    /// `signer` must be the mint authority; the ledger enforces that and a
    /// refusal surfaces as `Unauthorized`. With `create_if_missing` a missing
    /// holding account is created in the same transaction as the mint.
    pub async fn mint_to<S: TransactionSigner>(
        &self,
        signer: &S,
        mint: impl IntoAddress,
        recipient: impl IntoAddress,
        amount: &UiAmount,
        decimals: u8,
        options: MintToOptions,
    ) -> Result<Signature, TokenError> {
        let mint = mint.into_address()?;
        let recipient = recipient.into_address()?;
        let base_units = to_base_units(amount, decimals)?;
        if base_units == 0 {
            return Err(TokenError::InvalidAmount(
                "mint amount must be greater than zero".into(),
            ));
        }

        let instructions = self
            .mint_instructions(signer.address(), mint, recipient, base_units, decimals, options)
            .await?;
        self.submit(signer, instructions, None).await
    }

    /// Read a holding account. An address that only holds lamports has not
    /// been created yet: the create instruction adopts it.
    async fn holding_account(&self, account: &Address) -> Result<Option<LedgerAccount>, TokenError> {
        let found = self.ledger.get_account(account, self.commitment).await?;
        Ok(found.filter(|a| !(a.owner == Address::new(SYSTEM_PROGRAM_ID) && a.data.is_empty())))
    }

    async fn mint_instructions(
        &self,
        authority: Address,
        mint: Address,
        recipient: Address,
        base_units: u64,
        decimals: u8,
        options: MintToOptions,
    ) -> Result<Vec<SolInstruction>, TokenError> {
        let account = holding_address(mint, recipient)?;
        let exists = self.holding_account(&account).await?.is_some();

        let mut instructions = Vec::with_capacity(2);
        if !exists {
            if !options.create_if_missing {
                return Err(TokenError::AccountMissing { account });
            }
            debug!("holding account {account} will be created alongside the mint");
            instructions.push(create_associated_token_account(
                &authority, &account, &recipient, &mint,
            ));
        }
        instructions.push(mint_to_checked(
            &mint, &account, &authority, base_units, decimals,
        )?);

        Ok(instructions)
    }

    /// Create a new Token-2022 mint carrying its own metadata, then mint the
    /// initial supply to the signer.
    ///
    /// The mint account is created, given a metadata pointer to itself,
    /// initialized with the signer as mint authority and no freeze authority,
    /// and given its metadata, all in one transaction co-signed by a fresh
    /// mint keypair.
    pub async fn launch_token<S: TransactionSigner>(
        &self,
        signer: &S,
        token: &NewToken,
    ) -> Result<TokenLaunch, LaunchError> {
        token.validate().map_err(|e| LaunchError::unstarted(None, e))?;
        let supply = to_base_units(&token.initial_supply, token.decimals)
            .map_err(|e| LaunchError::unstarted(None, e))?;

        let mint_keypair = Keypair::generate();
        let mint = mint_keypair.address();
        let authority = signer.address();

        let instructions = self
            .launch_instructions(&authority, &mint, token)
            .await
            .map_err(|e| LaunchError::unstarted(Some(mint), e))?;

        let (mint_signature, blockhash) = self
            .send(signer, &instructions, Some(&mint_keypair))
            .await
            .map_err(|e| LaunchError::unstarted(Some(mint), e))?;
        info!("launch {mint}: {}", LaunchState::MintAccountSubmitted);

        self.confirm(&mint_signature, &blockhash, &instructions)
            .await
            .map_err(|source| LaunchError {
                state: LaunchState::MintAccountSubmitted,
                mint: Some(mint),
                mint_signature: Some(mint_signature),
                source,
            })?;
        info!("launch {mint}: {}", LaunchState::MintAccountConfirmed);

        let mut launch = TokenLaunch {
            mint,
            state: LaunchState::MintAccountConfirmed,
            mint_signature,
            supply_signature: None,
            supply_error: None,
        };
        if supply == 0 {
            return Ok(launch);
        }

        let supply_ixs = match self
            .mint_instructions(
                authority,
                mint,
                authority,
                supply,
                token.decimals,
                MintToOptions::default(),
            )
            .await
        {
            Ok(ixs) => ixs,
            Err(e) => return Ok(halt_supply(launch, e)),
        };

        let (supply_signature, blockhash) = match self.send(signer, &supply_ixs, None).await {
            Ok(sent) => sent,
            Err(e) => return Ok(halt_supply(launch, e)),
        };
        launch.state = LaunchState::SupplyMintSubmitted;
        launch.supply_signature = Some(supply_signature);
        info!("launch {mint}: {}", launch.state);

        if let Err(e) = self.confirm(&supply_signature, &blockhash, &supply_ixs).await {
            return Ok(halt_supply(launch, e));
        }
        launch.state = LaunchState::SupplyMintConfirmed;
        info!("launch {mint}: {}", launch.state);

        Ok(launch)
    }

    async fn launch_instructions(
        &self,
        authority: &Address,
        mint: &Address,
        token: &NewToken,
    ) -> Result<Vec<SolInstruction>, TokenError> {
        let metadata = TokenMetadata {
            update_authority: *authority,
            mint: *mint,
            name: token.name.clone(),
            symbol: token.symbol.clone(),
            uri: token.uri.clone(),
            additional_metadata: Vec::new(),
        };

        // Allocate for the pointer only; the metadata initialize reallocs the
        // account, so rent must already cover the final size.
        let space = mint_len_with_metadata_pointer();
        let lamports = self
            .ledger
            .get_minimum_balance_for_rent_exemption(space + metadata.tlv_len())
            .await?;

        Ok(vec![
            build_create_account(authority, mint, lamports, space as u64, &TOKEN_2022_PROGRAM_ID),
            initialize_metadata_pointer(mint, Some(authority), mint),
            initialize_mint2(mint, authority, None, token.decimals),
            initialize_token_metadata(
                mint,
                authority,
                mint,
                authority,
                &metadata.name,
                &metadata.symbol,
                &metadata.uri,
            )?,
        ])
    }

    /// Request `sol` from the cluster faucet and wait for it to land.
    pub async fn request_airdrop(
        &self,
        owner: impl IntoAddress,
        sol: &UiAmount,
    ) -> Result<Signature, TokenError> {
        let owner = owner.into_address()?;
        if !self.cluster.info().airdrop_available {
            return Err(TokenError::AirdropUnavailable(self.cluster.to_string()));
        }
        let lamports = sol_to_lamports(sol)?;
        if lamports == 0 {
            return Err(TokenError::InvalidAmount(
                "airdrop amount must be greater than zero".into(),
            ));
        }

        let blockhash = self.ledger.get_latest_blockhash(self.commitment).await?;
        let signature = self.ledger.request_airdrop(&owner, lamports).await?;
        info!("airdrop of {sol} SOL to {owner}: {signature}");

        self.ledger
            .confirm_transaction(&signature, &blockhash, self.commitment)
            .await?;
        Ok(signature)
    }

    /// Native SOL balance of `owner`.
    pub async fn get_sol_balance(&self, owner: impl IntoAddress) -> Result<UiAmount, TokenError> {
        let owner = owner.into_address()?;
        let lamports = self.ledger.get_balance(&owner, self.commitment).await?;
        Ok(lamports_to_sol(lamports))
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    async fn submit<S: TransactionSigner>(
        &self,
        signer: &S,
        instructions: Vec<SolInstruction>,
        co_signer: Option<&Keypair>,
    ) -> Result<Signature, TokenError> {
        let (signature, blockhash) = self.send(signer, &instructions, co_signer).await?;
        self.confirm(&signature, &blockhash, &instructions).await?;
        Ok(signature)
    }

    async fn send<S: TransactionSigner>(
        &self,
        signer: &S,
        instructions: &[SolInstruction],
        co_signer: Option<&Keypair>,
    ) -> Result<(Signature, RecentBlockhash), TokenError> {
        let payer = signer.address();
        let blockhash = self.ledger.get_latest_blockhash(self.commitment).await?;

        let tx = compile_transaction(instructions, &payer.to_bytes(), &blockhash.blockhash)?;
        let mut wire = unsigned_wire(&tx)?;
        if let Some(keypair) = co_signer {
            wire = sign_raw_transaction(keypair, &wire)?;
        }
        debug!(
            "transaction from {payer}: {} instruction(s), {} signer(s), {} bytes",
            instructions.len(),
            tx.num_required_signatures,
            wire.len()
        );

        let signature = signer
            .sign_and_send(&wire, &self.ledger)
            .await
            .map_err(|e| match e {
                SubmitError::Declined(reason) => TokenError::SignerDeclined(reason),
                SubmitError::Ledger(err) => classify_ledger_error(err, instructions),
            })?;
        info!("submitted {signature}");

        Ok((signature, blockhash))
    }

    async fn confirm(
        &self,
        signature: &Signature,
        blockhash: &RecentBlockhash,
        instructions: &[SolInstruction],
    ) -> Result<(), TokenError> {
        self.ledger
            .confirm_transaction(signature, blockhash, self.commitment)
            .await
            .map_err(|e| classify_ledger_error(e, instructions))?;
        info!("confirmed {signature} ({})", self.commitment.as_str());
        Ok(())
    }
}

fn halt_supply(mut launch: TokenLaunch, e: TokenError) -> TokenLaunch {
    warn!(
        "mint {} created but initial supply not confirmed ({}): {e}",
        launch.mint, launch.state
    );
    launch.supply_error = Some(e);
    launch
}
