use serde::{Deserialize, Serialize};
use tethys_codec::minicbor::{self, Decode, Encode};

use crate::{
    certs::{CommitteeColdCredential, RationalNumber, UnitInterval},
    witness::ExUnits,
    AddrKeyhash, Anchor, Coin, Epoch, Hash, OrderedMap, RewardAccount, ScriptHash, Set,
};

#[derive(Encode, Decode, Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
#[cbor(index_only)]
pub enum Vote {
    #[n(0)]
    No,

    #[n(1)]
    Yes,

    #[n(2)]
    Abstain,
}

/// Who is casting a governance vote
#[derive(Serialize, Deserialize, Debug, PartialEq, PartialOrd, Eq, Ord, Clone)]
pub enum Voter {
    ConstitutionalCommitteeKey(AddrKeyhash),
    ConstitutionalCommitteeScript(ScriptHash),
    DRepKey(AddrKeyhash),
    DRepScript(ScriptHash),
    StakePoolKey(AddrKeyhash),
}

impl<'b, C> minicbor::decode::Decode<'b, C> for Voter {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        d.array()?;
        let variant = d.u16()?;

        match variant {
            0 => Ok(Voter::ConstitutionalCommitteeKey(d.decode_with(ctx)?)),
            1 => Ok(Voter::ConstitutionalCommitteeScript(d.decode_with(ctx)?)),
            2 => Ok(Voter::DRepKey(d.decode_with(ctx)?)),
            3 => Ok(Voter::DRepScript(d.decode_with(ctx)?)),
            4 => Ok(Voter::StakePoolKey(d.decode_with(ctx)?)),
            _ => Err(minicbor::decode::Error::message(
                "invalid variant id for voter",
            )),
        }
    }
}

impl<C> minicbor::encode::Encode<C> for Voter {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self {
            Voter::ConstitutionalCommitteeKey(a) => {
                e.array(2)?;
                e.encode_with(0, ctx)?;
                e.encode_with(a, ctx)?;
            }
            Voter::ConstitutionalCommitteeScript(a) => {
                e.array(2)?;
                e.encode_with(1, ctx)?;
                e.encode_with(a, ctx)?;
            }
            Voter::DRepKey(a) => {
                e.array(2)?;
                e.encode_with(2, ctx)?;
                e.encode_with(a, ctx)?;
            }
            Voter::DRepScript(a) => {
                e.array(2)?;
                e.encode_with(3, ctx)?;
                e.encode_with(a, ctx)?;
            }
            Voter::StakePoolKey(a) => {
                e.array(2)?;
                e.encode_with(4, ctx)?;
                e.encode_with(a, ctx)?;
            }
        }

        Ok(())
    }
}

/// `[vote, anchor / nil]`; the anchor slot is always present, so the
/// codec is hand-written rather than derived
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct VotingProcedure {
    pub vote: Vote,
    pub anchor: Option<Anchor>,
}

impl<'b, C> minicbor::decode::Decode<'b, C> for VotingProcedure {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        d.array()?;

        Ok(VotingProcedure {
            vote: d.decode_with(ctx)?,
            anchor: d.decode_with(ctx)?,
        })
    }
}

impl<C> minicbor::encode::Encode<C> for VotingProcedure {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(2)?;
        e.encode_with(&self.vote, ctx)?;
        e.encode_with(&self.anchor, ctx)?;

        Ok(())
    }
}

/// A governance action gets pointed at by the transaction that proposed it
#[derive(Encode, Decode, Serialize, Deserialize, Debug, PartialEq, Eq, Clone, PartialOrd, Ord)]
pub struct GovActionId {
    #[n(0)]
    pub transaction_id: Hash<32>,

    #[n(1)]
    pub action_index: u32,
}

pub type VotingProcedures = OrderedMap<Voter, OrderedMap<GovActionId, VotingProcedure>>;

#[derive(Encode, Decode, Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct ProposalProcedure {
    #[n(0)]
    pub deposit: Coin,

    #[n(1)]
    pub reward_account: RewardAccount,

    #[n(2)]
    pub gov_action: GovAction,

    #[n(3)]
    pub anchor: Anchor,
}

/// What a proposal asks the chain to do; `gov_action_id / nil` slots are
/// written out explicitly
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub enum GovAction {
    ParameterChange(
        Option<GovActionId>,
        Box<ProtocolParamUpdate>,
        Option<ScriptHash>,
    ),
    HardForkInitiation(Option<GovActionId>, ProtocolVersion),
    TreasuryWithdrawals(OrderedMap<RewardAccount, Coin>, Option<ScriptHash>),
    NoConfidence(Option<GovActionId>),
    UpdateCommittee(
        Option<GovActionId>,
        Set<CommitteeColdCredential>,
        OrderedMap<CommitteeColdCredential, Epoch>,
        UnitInterval,
    ),
    NewConstitution(Option<GovActionId>, Constitution),
    Information,
}

impl<'b, C> minicbor::decode::Decode<'b, C> for GovAction {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        d.array()?;
        let variant = d.u16()?;

        match variant {
            0 => Ok(GovAction::ParameterChange(
                d.decode_with(ctx)?,
                d.decode_with(ctx)?,
                d.decode_with(ctx)?,
            )),
            1 => Ok(GovAction::HardForkInitiation(
                d.decode_with(ctx)?,
                d.decode_with(ctx)?,
            )),
            2 => Ok(GovAction::TreasuryWithdrawals(
                d.decode_with(ctx)?,
                d.decode_with(ctx)?,
            )),
            3 => Ok(GovAction::NoConfidence(d.decode_with(ctx)?)),
            4 => Ok(GovAction::UpdateCommittee(
                d.decode_with(ctx)?,
                d.decode_with(ctx)?,
                d.decode_with(ctx)?,
                d.decode_with(ctx)?,
            )),
            5 => Ok(GovAction::NewConstitution(
                d.decode_with(ctx)?,
                d.decode_with(ctx)?,
            )),
            6 => Ok(GovAction::Information),
            _ => Err(minicbor::decode::Error::message(
                "unknown variant id for governance action",
            )),
        }
    }
}

impl<C> minicbor::encode::Encode<C> for GovAction {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        match self {
            GovAction::ParameterChange(id, update, policy) => {
                e.array(4)?;
                e.u16(0)?;
                e.encode_with(id, ctx)?;
                e.encode_with(update, ctx)?;
                e.encode_with(policy, ctx)?;
            }
            GovAction::HardForkInitiation(id, version) => {
                e.array(3)?;
                e.u16(1)?;
                e.encode_with(id, ctx)?;
                e.encode_with(version, ctx)?;
            }
            GovAction::TreasuryWithdrawals(withdrawals, policy) => {
                e.array(3)?;
                e.u16(2)?;
                e.encode_with(withdrawals, ctx)?;
                e.encode_with(policy, ctx)?;
            }
            GovAction::NoConfidence(id) => {
                e.array(2)?;
                e.u16(3)?;
                e.encode_with(id, ctx)?;
            }
            GovAction::UpdateCommittee(id, removed, added, threshold) => {
                e.array(5)?;
                e.u16(4)?;
                e.encode_with(id, ctx)?;
                e.encode_with(removed, ctx)?;
                e.encode_with(added, ctx)?;
                e.encode_with(threshold, ctx)?;
            }
            GovAction::NewConstitution(id, constitution) => {
                e.array(3)?;
                e.u16(5)?;
                e.encode_with(id, ctx)?;
                e.encode_with(constitution, ctx)?;
            }
            GovAction::Information => {
                e.array(1)?;
                e.u16(6)?;
            }
        }

        Ok(())
    }
}

/// `[anchor, script_hash / nil]`
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct Constitution {
    pub anchor: Anchor,
    pub guardrail_script: Option<ScriptHash>,
}

impl<'b, C> minicbor::decode::Decode<'b, C> for Constitution {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        d.array()?;

        Ok(Constitution {
            anchor: d.decode_with(ctx)?,
            guardrail_script: d.decode_with(ctx)?,
        })
    }
}

impl<C> minicbor::encode::Encode<C> for Constitution {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(2)?;
        e.encode_with(&self.anchor, ctx)?;
        e.encode_with(&self.guardrail_script, ctx)?;

        Ok(())
    }
}

pub type ProtocolVersion = (u64, u64);

pub type CostModel = Vec<i64>;

#[derive(Serialize, Deserialize, Encode, Debug, PartialEq, Eq, Clone, Default)]
#[cbor(map)]
pub struct CostModels {
    #[n(0)]
    pub plutus_v1: Option<CostModel>,

    #[n(1)]
    pub plutus_v2: Option<CostModel>,

    #[n(2)]
    pub plutus_v3: Option<CostModel>,

    #[cbor(skip)]
    pub unknown: Vec<(u64, CostModel)>,
}

impl<'b, C> minicbor::Decode<'b, C> for CostModels {
    fn decode(d: &mut minicbor::Decoder<'b>, ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let models: OrderedMap<u64, CostModel> = d.decode_with(ctx)?;

        let mut out = CostModels::default();

        for (key, model) in models.to_vec() {
            match key {
                0 => out.plutus_v1 = Some(model),
                1 => out.plutus_v2 = Some(model),
                2 => out.plutus_v3 = Some(model),
                _ => out.unknown.push((key, model)),
            }
        }

        Ok(out)
    }
}

#[derive(Serialize, Deserialize, Encode, Decode, Debug, PartialEq, Eq, Clone)]
pub struct ExUnitPrices {
    #[n(0)]
    pub mem_price: RationalNumber,

    #[n(1)]
    pub step_price: RationalNumber,
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct PoolVotingThresholds {
    #[n(0)]
    pub motion_no_confidence: UnitInterval,

    #[n(1)]
    pub committee_normal: UnitInterval,

    #[n(2)]
    pub committee_no_confidence: UnitInterval,

    #[n(3)]
    pub hard_fork_initiation: UnitInterval,

    #[n(4)]
    pub security_voting_threshold: UnitInterval,
}

#[derive(Encode, Decode, Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct DRepVotingThresholds {
    #[n(0)]
    pub motion_no_confidence: UnitInterval,

    #[n(1)]
    pub committee_normal: UnitInterval,

    #[n(2)]
    pub committee_no_confidence: UnitInterval,

    #[n(3)]
    pub update_constitution: UnitInterval,

    #[n(4)]
    pub hard_fork_initiation: UnitInterval,

    #[n(5)]
    pub pp_network_group: UnitInterval,

    #[n(6)]
    pub pp_economic_group: UnitInterval,

    #[n(7)]
    pub pp_technical_group: UnitInterval,

    #[n(8)]
    pub pp_governance_group: UnitInterval,

    #[n(9)]
    pub treasury_withdrawal: UnitInterval,
}

/// The subset of protocol parameters a parameter-change action can touch
#[derive(Serialize, Deserialize, Encode, Decode, Debug, PartialEq, Eq, Clone)]
#[cbor(map)]
pub struct ProtocolParamUpdate {
    #[n(0)]
    pub minfee_a: Option<u64>,

    #[n(1)]
    pub minfee_b: Option<u64>,

    #[n(2)]
    pub max_block_body_size: Option<u64>,

    #[n(3)]
    pub max_transaction_size: Option<u64>,

    #[n(4)]
    pub max_block_header_size: Option<u64>,

    #[n(5)]
    pub key_deposit: Option<Coin>,

    #[n(6)]
    pub pool_deposit: Option<Coin>,

    #[n(7)]
    pub maximum_epoch: Option<Epoch>,

    #[n(8)]
    pub desired_number_of_stake_pools: Option<u64>,

    #[n(9)]
    pub pool_pledge_influence: Option<RationalNumber>,

    #[n(10)]
    pub expansion_rate: Option<UnitInterval>,

    #[n(11)]
    pub treasury_growth_rate: Option<UnitInterval>,

    #[n(16)]
    pub min_pool_cost: Option<Coin>,

    #[n(17)]
    pub ada_per_utxo_byte: Option<Coin>,

    #[n(18)]
    pub cost_models_for_script_languages: Option<CostModels>,

    #[n(19)]
    pub execution_costs: Option<ExUnitPrices>,

    #[n(20)]
    pub max_tx_ex_units: Option<ExUnits>,

    #[n(21)]
    pub max_block_ex_units: Option<ExUnits>,

    #[n(22)]
    pub max_value_size: Option<u64>,

    #[n(23)]
    pub collateral_percentage: Option<u64>,

    #[n(24)]
    pub max_collateral_inputs: Option<u64>,

    #[n(25)]
    pub pool_voting_thresholds: Option<PoolVotingThresholds>,

    #[n(26)]
    pub drep_voting_thresholds: Option<DRepVotingThresholds>,

    #[n(27)]
    pub min_committee_size: Option<u64>,

    #[n(28)]
    pub committee_term_limit: Option<Epoch>,

    #[n(29)]
    pub governance_action_validity_period: Option<Epoch>,

    #[n(30)]
    pub governance_action_deposit: Option<Coin>,

    #[n(31)]
    pub drep_deposit: Option<Coin>,

    #[n(32)]
    pub drep_inactivity_period: Option<Epoch>,

    #[n(33)]
    pub minfee_refscript_cost_per_byte: Option<UnitInterval>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Fragment, StakeCredential};

    #[test]
    fn voting_procedures_nest_two_maps() {
        let voter = Voter::DRepKey(Hash::from([1; 28]));
        let action = GovActionId {
            transaction_id: Hash::from([2; 32]),
            action_index: 0,
        };
        let procedure = VotingProcedure {
            vote: Vote::Yes,
            anchor: None,
        };

        let procedures: VotingProcedures =
            vec![(voter, vec![(action, procedure)].into())].into();

        let bytes = procedures.to_cbor().unwrap();
        let decoded = VotingProcedures::from_cbor(&bytes).unwrap();
        assert_eq!(decoded, procedures);
    }

    #[test]
    fn gov_action_variants_roundtrip() {
        let actions = vec![
            GovAction::NoConfidence(None),
            GovAction::Information,
            GovAction::HardForkInitiation(None, (10, 0)),
            GovAction::UpdateCommittee(
                None,
                vec![StakeCredential::AddrKeyhash(Hash::from([1; 28]))].into(),
                vec![(StakeCredential::AddrKeyhash(Hash::from([2; 28])), 300)].into(),
                RationalNumber {
                    numerator: 2,
                    denominator: 3,
                },
            ),
        ];

        for action in actions {
            let bytes = action.to_cbor().unwrap();
            assert_eq!(GovAction::from_cbor(&bytes).unwrap(), action);
        }
    }

    #[test]
    fn cost_models_keep_unknown_languages() {
        // {0: [1, 2], 9: [7]}
        let bytes = hex::decode("a200820102098107").unwrap();
        let models = CostModels::from_cbor(&bytes).unwrap();

        assert_eq!(models.plutus_v1, Some(vec![1, 2]));
        assert_eq!(models.unknown, vec![(9, vec![7])]);
    }
}
