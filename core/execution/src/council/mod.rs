// tessera/core/execution/src/council/mod.rs

//! Governance-approved upgrades of trusted system contracts, applied
//! directly against the VM outside of transaction ingestion.

pub mod assembler;
pub mod contracts;

use revm::{primitives::ResultAndState, DatabaseCommit};
use serde::{Deserialize, Serialize};
use tessera_primitives::{gas::MAX_CODE_SIZE, keccak256, Address, U256};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::ExecutionConfig;
use crate::error::ExecutionError;
use crate::events::EvmEvent;
use crate::executor::Executor;
use crate::metrics::PROPOSAL_DIRECTIVES_TOTAL;
use crate::revm_adapter::{transact, vm_outcome, VmCall};
use crate::state::{StateError, StateView};

pub use assembler::{Assembler, AssemblerError};

/// Gas granted to every council call.
pub const SYSTEM_CALL_GAS: u64 = 30_000_000;

#[derive(Debug, Error)]
pub enum CouncilError {
    #[error("proxy {0:?} is not trusted")]
    UntrustedProxy(Address),

    #[error("implementation {0:?} has no code")]
    ImplementationNotFound(Address),

    #[error("contract address collision at {0:?}")]
    ContractAddressCollision(Address),

    #[error("code of {address:?} exceeds max size: {size}")]
    CodeSizeExceeded { address: Address, size: usize },

    #[error("invalid code prefix at {0:?}")]
    InvalidCode(Address),

    #[error("call to {target:?} failed: {reason}")]
    Execution { target: Address, reason: String },

    #[error(transparent)]
    Assembler(#[from] AssemblerError),

    #[error(transparent)]
    Executor(#[from] ExecutionError),

    #[error(transparent)]
    State(#[from] StateError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CouncilConfig {
    /// Fixed address of the admin contract.
    pub admin_address: Address,
    /// Sole account allowed to call the admin contract.
    pub consensus_owner: Address,
    /// Caller of deployments; its nonce seeds created addresses.
    pub deployer: Address,
    pub trusted_proxies: Vec<Address>,
}

impl Default for CouncilConfig {
    fn default() -> Self {
        Self {
            admin_address: Address::from_low_u64_be(0xad),
            consensus_owner: Address::from_low_u64_be(0xc0),
            deployer: Address::from_low_u64_be(0xde),
            trusted_proxies: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImplementationSource {
    /// Already deployed contract.
    Existing(Address),
    /// Deployed by the council's deployer before the upgrade.
    Deploy { init_code: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeDirective {
    pub proxy: Address,
    pub implementation: ImplementationSource,
    /// Delegated to the new implementation after the upgrade when non-empty.
    pub data: Vec<u8>,
    pub value: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveOutcome {
    pub admin: Address,
    pub proxy: Address,
    pub implementation: Address,
    pub ret: Vec<u8>,
}

pub struct ProposalCouncil {
    config: CouncilConfig,
}

impl ProposalCouncil {
    pub fn new(config: CouncilConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CouncilConfig {
        &self.config
    }

    pub fn is_trusted(&self, proxy: &Address) -> bool {
        self.config.trusted_proxies.contains(proxy)
    }

    /// Applies `directive` in the executor's current block. Either every
    /// step lands in the ledger or none does.
    pub fn execute(
        &self,
        executor: &mut Executor,
        directive: &UpgradeDirective,
    ) -> Result<DirectiveOutcome, CouncilError> {
        if !self.is_trusted(&directive.proxy) {
            PROPOSAL_DIRECTIVES_TOTAL.with_label_values(&["rejected"]).inc();
            return Err(CouncilError::UntrustedProxy(directive.proxy));
        }

        let config = executor.evm_config()?;
        let ledger = executor.ledger();
        let mut view = StateView::new(ledger.as_ref(), executor.block_hash_context()?);
        let checkpoint = view.checkpoint();

        match self.apply(&mut view, &config, directive) {
            Ok(outcome) => {
                view.flush();
                executor.emit(EvmEvent::ProposalExecuted {
                    proxy: outcome.proxy,
                    implementation: outcome.implementation,
                });
                PROPOSAL_DIRECTIVES_TOTAL.with_label_values(&["success"]).inc();
                info!(
                    proxy = ?outcome.proxy,
                    implementation = ?outcome.implementation,
                    "Executed proposal directive"
                );
                Ok(outcome)
            }
            Err(err) => {
                view.revert_to(checkpoint)?;
                PROPOSAL_DIRECTIVES_TOTAL.with_label_values(&["failed"]).inc();
                warn!(proxy = ?directive.proxy, error = %err, "Proposal directive failed");
                Err(err)
            }
        }
    }

    fn apply(
        &self,
        view: &mut StateView<'_>,
        config: &ExecutionConfig,
        directive: &UpgradeDirective,
    ) -> Result<DirectiveOutcome, CouncilError> {
        let implementation = self.resolve_implementation(view, config, &directive.implementation)?;
        let admin = self.config.admin_address;

        self.get_or_create(
            view,
            config,
            admin,
            &contracts::admin_runtime()?,
            &contracts::admin_init_code(&self.config.consensus_owner)?,
        )?;
        self.get_or_create(
            view,
            config,
            directive.proxy,
            &contracts::proxy_runtime()?,
            &contracts::proxy_init_code(&admin, &implementation)?,
        )?;

        let calldata =
            contracts::upgrade_to_and_call(&directive.proxy, &implementation, &directive.data);
        let ret = system_call(
            view,
            config,
            self.config.consensus_owner,
            Some(admin),
            directive.value,
            &calldata,
        )?
        .output;

        Ok(DirectiveOutcome {
            admin,
            proxy: directive.proxy,
            implementation,
            ret,
        })
    }

    fn resolve_implementation(
        &self,
        view: &mut StateView<'_>,
        config: &ExecutionConfig,
        source: &ImplementationSource,
    ) -> Result<Address, CouncilError> {
        match source {
            ImplementationSource::Existing(address) => {
                if view.code(address).is_empty() {
                    return Err(CouncilError::ImplementationNotFound(*address));
                }
                Ok(*address)
            }
            ImplementationSource::Deploy { init_code } => {
                let deployer = self.config.deployer;
                let expected = tessera_primitives::create_address(&deployer, view.nonce(&deployer));
                let call = system_call(view, config, deployer, None, U256::zero(), init_code)?;
                let address = call.created.unwrap_or(expected);
                check_runtime(address, &view.code(&address))?;
                if view.code(&address).is_empty() {
                    return Err(CouncilError::ImplementationNotFound(address));
                }
                Ok(address)
            }
        }
    }

    /// Deploys `init_code` at the fixed `address` unless `runtime` is
    /// already there. Returns whether a deployment happened.
    fn get_or_create(
        &self,
        view: &mut StateView<'_>,
        config: &ExecutionConfig,
        address: Address,
        runtime: &[u8],
        init_code: &[u8],
    ) -> Result<bool, CouncilError> {
        if view.code_hash(&address) == keccak256(runtime) {
            return Ok(false);
        }
        if view.nonce(&address) != 0 || !view.code(&address).is_empty() {
            return Err(CouncilError::ContractAddressCollision(address));
        }

        // Run the constructor in place, then swap in the runtime it returns.
        view.set_code(address, init_code.to_vec());
        view.set_nonce(address, 1);
        let deployed = system_call(
            view,
            config,
            self.config.deployer,
            Some(address),
            U256::zero(),
            &[],
        )?
        .output;
        check_runtime(address, &deployed)?;
        view.set_code(address, deployed);
        info!(?address, "Deployed system contract");
        Ok(true)
    }
}

struct SystemCall {
    output: Vec<u8>,
    created: Option<Address>,
}

/// One VM call outside any transaction. The caller's nonce advances as for
/// a transaction; any VM fault is an error.
fn system_call(
    view: &mut StateView<'_>,
    config: &ExecutionConfig,
    caller: Address,
    to: Option<Address>,
    value: U256,
    data: &[u8],
) -> Result<SystemCall, CouncilError> {
    let ResultAndState { result, state } = transact(
        view,
        config,
        &VmCall {
            caller,
            to,
            value,
            data,
            gas_limit: SYSTEM_CALL_GAS,
            nonce: None,
            access_list: None,
        },
    )?;
    view.commit(state);

    let outcome = vm_outcome(result);
    if !outcome.vm_error.is_empty() {
        return Err(CouncilError::Execution {
            target: to.unwrap_or_default(),
            reason: outcome.vm_error,
        });
    }
    Ok(SystemCall {
        output: outcome.output,
        created: outcome.created,
    })
}

fn check_runtime(address: Address, code: &[u8]) -> Result<(), CouncilError> {
    if code.len() > MAX_CODE_SIZE {
        return Err(CouncilError::CodeSizeExceeded {
            address,
            size: code.len(),
        });
    }
    if code.first() == Some(&0xef) {
        return Err(CouncilError::InvalidCode(address));
    }
    Ok(())
}
