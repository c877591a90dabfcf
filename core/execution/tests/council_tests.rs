// Integration tests for proposal council directives

use std::sync::Arc;

use tessera_execution::council::assembler::{op, Assembler};
use tessera_execution::council::contracts::{
    address_word, admin_runtime, admin_slot, implementation_slot, proxy_runtime, word_address,
};
use tessera_execution::{
    BlockHeader, CouncilConfig, CouncilError, EvmEvent, EvmParams, Executor,
    ImplementationSource, LedgerState, MemoryLedger, MsgServiceRouter, ProposalCouncil,
    UpgradeDirective,
};
use tessera_primitives::{create_address, keccak256, Address, Message, H256, U256};

fn create_test_header(height: u64) -> BlockHeader {
    BlockHeader {
        height,
        hash: H256::repeat_byte(height as u8),
        time: 1_700_000_000,
        proposer: Address::repeat_byte(0xcb),
        gas_limit: 30_000_000,
    }
}

/// Stores calldata word 0 in slot 0.
fn store_runtime() -> Vec<u8> {
    let mut asm = Assembler::new();
    asm.push_u64(0)
        .op(op::CALLDATALOAD)
        .push_u64(0)
        .op(op::SSTORE)
        .op(op::STOP);
    asm.assemble().unwrap()
}

fn revert_runtime() -> Vec<u8> {
    let mut asm = Assembler::new();
    asm.push_u64(0).op(op::DUP1).op(op::REVERT);
    asm.assemble().unwrap()
}

fn init_code(runtime: &[u8]) -> Vec<u8> {
    let mut asm = Assembler::new();
    asm.push_u64(runtime.len() as u64)
        .op(op::DUP1)
        .push_label("runtime")
        .push_u64(0)
        .op(op::CODECOPY)
        .push_u64(0)
        .op(op::RETURN)
        .mark("runtime")
        .raw(runtime);
    asm.assemble().unwrap()
}

fn word(value: u64) -> Vec<u8> {
    let mut out = [0u8; 32];
    U256::from(value).to_big_endian(&mut out);
    out.to_vec()
}

fn proxy() -> Address {
    Address::from_low_u64_be(0x1000)
}

fn setup() -> (Arc<MemoryLedger>, Executor, ProposalCouncil) {
    let ledger = Arc::new(MemoryLedger::new());
    let mut executor = Executor::new(
        ledger.clone(),
        Arc::new(MsgServiceRouter::new()),
        EvmParams::default(),
    );
    executor.begin_block(create_test_header(1));
    let council = ProposalCouncil::new(CouncilConfig {
        trusted_proxies: vec![proxy()],
        ..Default::default()
    });
    (ledger, executor, council)
}

fn directive(implementation: ImplementationSource, data: Vec<u8>) -> UpgradeDirective {
    UpgradeDirective {
        proxy: proxy(),
        implementation,
        data,
        value: U256::zero(),
    }
}

#[cfg(test)]
mod council_tests {
    use super::*;

    #[test]
    fn test_first_directive_deploys_admin_and_proxy() {
        let (ledger, mut executor, council) = setup();
        let implementation = Address::repeat_byte(0x10);
        ledger.deploy_code(implementation, store_runtime());

        let outcome = council
            .execute(
                &mut executor,
                &directive(ImplementationSource::Existing(implementation), word(5)),
            )
            .unwrap();

        let admin = council.config().admin_address;
        assert_eq!(outcome.admin, admin);
        assert_eq!(outcome.implementation, implementation);
        assert_eq!(ledger.account_code(&admin), admin_runtime().unwrap());
        assert_eq!(ledger.account_code(&proxy()), proxy_runtime().unwrap());
        assert_eq!(
            ledger.storage(&admin, &H256::zero()),
            H256(address_word(&council.config().consensus_owner))
        );
        assert_eq!(
            word_address(&ledger.storage(&proxy(), &implementation_slot())),
            implementation
        );
        assert_eq!(word_address(&ledger.storage(&proxy(), &admin_slot())), admin);
        // initializer ran against the proxy's storage
        assert_eq!(ledger.storage(&proxy(), &H256::zero()), H256::from_low_u64_be(5));
        assert_eq!(ledger.storage(&implementation, &H256::zero()), H256::zero());
        assert!(executor.events().contains(&EvmEvent::ProposalExecuted {
            proxy: proxy(),
            implementation
        }));
    }

    #[test]
    fn test_proxy_delegates_other_callers() {
        let (ledger, mut executor, council) = setup();
        let implementation = Address::repeat_byte(0x10);
        ledger.deploy_code(implementation, store_runtime());
        council
            .execute(
                &mut executor,
                &directive(ImplementationSource::Existing(implementation), vec![]),
            )
            .unwrap();

        let user = Address::repeat_byte(0x42);
        let msg = Message::call(user, Some(proxy()), 0, 200_000, word(8));
        let result = executor.apply_message(&msg, None, true).unwrap();
        assert!(!result.failed(), "{}", result.vm_error);
        assert_eq!(ledger.storage(&proxy(), &H256::zero()), H256::from_low_u64_be(8));
    }

    #[test]
    fn test_second_directive_reuses_contracts() {
        let (ledger, mut executor, council) = setup();
        let first = Address::repeat_byte(0x10);
        ledger.deploy_code(first, store_runtime());
        council
            .execute(&mut executor, &directive(ImplementationSource::Existing(first), vec![]))
            .unwrap();
        let admin = council.config().admin_address;
        let admin_nonce = ledger.nonce(&admin);
        let proxy_nonce = ledger.nonce(&proxy());

        let deployer = council.config().deployer;
        let expected = create_address(&deployer, ledger.nonce(&deployer));
        let outcome = council
            .execute(
                &mut executor,
                &directive(
                    ImplementationSource::Deploy {
                        init_code: init_code(&store_runtime()),
                    },
                    word(3),
                ),
            )
            .unwrap();

        assert_eq!(outcome.implementation, expected);
        assert_eq!(ledger.account_code(&expected), store_runtime());
        assert_eq!(ledger.nonce(&admin), admin_nonce);
        assert_eq!(ledger.nonce(&proxy()), proxy_nonce);
        assert_eq!(
            word_address(&ledger.storage(&proxy(), &implementation_slot())),
            expected
        );
        assert_eq!(ledger.storage(&proxy(), &H256::zero()), H256::from_low_u64_be(3));
    }

    #[test]
    fn test_untrusted_proxy_rejected() {
        let (ledger, mut executor, council) = setup();
        let mut d = directive(ImplementationSource::Existing(Address::repeat_byte(1)), vec![]);
        d.proxy = Address::repeat_byte(0xee);
        let err = council.execute(&mut executor, &d).unwrap_err();
        assert!(matches!(err, CouncilError::UntrustedProxy(p) if p == Address::repeat_byte(0xee)));
        assert!(ledger.account_code(&council.config().admin_address).is_empty());
    }

    #[test]
    fn test_missing_implementation_rejected() {
        let (ledger, mut executor, council) = setup();
        let eoa = Address::repeat_byte(0x33);
        ledger.fund(eoa, U256::from(1));
        let err = council
            .execute(&mut executor, &directive(ImplementationSource::Existing(eoa), vec![]))
            .unwrap_err();
        assert!(matches!(err, CouncilError::ImplementationNotFound(a) if a == eoa));
    }

    #[test]
    fn test_collision_at_proxy_rolls_back_admin() {
        let (ledger, mut executor, council) = setup();
        let implementation = Address::repeat_byte(0x10);
        ledger.deploy_code(implementation, store_runtime());
        ledger.deploy_code(proxy(), vec![op::STOP]);

        let err = council
            .execute(
                &mut executor,
                &directive(ImplementationSource::Existing(implementation), vec![]),
            )
            .unwrap_err();

        assert!(matches!(err, CouncilError::ContractAddressCollision(a) if a == proxy()));
        let admin = council.config().admin_address;
        assert!(ledger.account_code(&admin).is_empty());
        assert_eq!(ledger.nonce(&admin), 0);
        assert_eq!(ledger.account_code(&proxy()), vec![op::STOP]);
        assert!(!executor
            .events()
            .iter()
            .any(|e| matches!(e, EvmEvent::ProposalExecuted { .. })));
    }

    #[test]
    fn test_collision_on_used_admin_address() {
        let (ledger, mut executor, council) = setup();
        let implementation = Address::repeat_byte(0x10);
        ledger.deploy_code(implementation, store_runtime());
        ledger.set_nonce(council.config().admin_address, 1);

        let err = council
            .execute(
                &mut executor,
                &directive(ImplementationSource::Existing(implementation), vec![]),
            )
            .unwrap_err();
        assert!(matches!(err, CouncilError::ContractAddressCollision(_)));
        assert!(ledger.account_code(&proxy()).is_empty());
    }

    #[test]
    fn test_failing_initializer_aborts_directive() {
        let (ledger, mut executor, council) = setup();
        let implementation = Address::repeat_byte(0x10);
        ledger.deploy_code(implementation, revert_runtime());

        let err = council
            .execute(
                &mut executor,
                &directive(ImplementationSource::Existing(implementation), word(1)),
            )
            .unwrap_err();

        assert!(matches!(err, CouncilError::Execution { .. }));
        assert!(ledger.account_code(&council.config().admin_address).is_empty());
        assert!(ledger.account_code(&proxy()).is_empty());
    }

    #[test]
    fn test_invalid_runtime_rejected() {
        let (ledger, mut executor, council) = setup();
        let deployer = council.config().deployer;
        let err = council
            .execute(
                &mut executor,
                &directive(
                    ImplementationSource::Deploy {
                        init_code: init_code(&[0xef, 0x00]),
                    },
                    vec![],
                ),
            )
            .unwrap_err();
        assert!(matches!(err, CouncilError::Execution { .. } | CouncilError::InvalidCode(_)));
        assert_eq!(ledger.nonce(&deployer), 0);
        assert_ne!(
            ledger.account(&create_address(&deployer, 0)).map(|a| a.code_hash),
            Some(keccak256(&[0xef, 0x00]))
        );
    }
}
