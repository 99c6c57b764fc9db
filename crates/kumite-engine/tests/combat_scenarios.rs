//! End-to-end combat scenarios driven through the [`Arena`].
//!
//! Every test builds a small skill library, spawns combatants a fixed
//! distance apart and steps the clock tick by tick, then checks states,
//! scalars, bookkeeping and the combat journal.

use kumite_core::skill::SkillBuilder;
use kumite_engine::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn frame(startup: u32, active: u32, recovery: i32, region: HitRegion) -> FrameData {
    FrameData::builder()
        .startup(startup)
        .active(active)
        .recovery(recovery)
        .contact_stun(8)
        .block_stun(4)
        .animation(Animation::builder().id("swing").build().unwrap())
        .hitbox(
            Hitbox::builder()
                .size(1.0, 1.0)
                .offset(1.0, 0.0)
                .region(region)
                .build()
                .unwrap(),
        )
        .build()
        .unwrap()
}

fn skill(name: &str, button: Button, startup: u32, active: u32, recovery: i32) -> SkillBuilder {
    Skill::builder(name)
        .frame_data(frame(startup, active, recovery, HitRegion::High))
        .motion([MotionToken::Button(button)])
}

fn arena_with(skills: Vec<Skill>) -> Arena {
    init_tracing();
    Arena::new(CombatConfig::default(), SkillLibrary::new(skills).unwrap()).unwrap()
}

/// Attacker at the origin facing right, defender inside its hitbox reach.
fn duel(arena: &mut Arena) -> (CombatantId, CombatantId) {
    let attacker = arena.spawn((0.0, 0.0), Facing::Right);
    let defender = arena.spawn((1.2, 0.0), Facing::Left);
    (attacker, defender)
}

fn id(arena: &Arena, name: &str) -> SkillId {
    arena.library().id_of(name).unwrap()
}

fn hits_by(arena: &Arena, attacker: CombatantId) -> Vec<(u64, CombatantId, HitOutcome)> {
    arena.journal().hits_by(attacker).collect()
}

// ---------------------------------------------------------------------------
// 1. Frame timing
// ---------------------------------------------------------------------------

#[test]
fn whiffed_skill_takes_twenty_ticks() {
    let mut arena = arena_with(vec![skill("jab", Button::Light, 4, 6, 10).build().unwrap()]);
    let fighter = arena.spawn((0.0, 0.0), Facing::Right);
    let jab = id(&arena, "jab");

    let stamp = arena.trigger(fighter, jab).unwrap();
    assert_eq!(stamp.tick, 0);
    assert_eq!(arena.state(fighter), Some(CombatState::Startup));

    arena.run_ticks(19);
    assert_eq!(arena.state(fighter), Some(CombatState::Recovery));
    arena.step_tick();
    assert_eq!(arena.state(fighter), Some(CombatState::Idle));
    assert!(!arena.is_executing(fighter));

    let journal = arena.journal();
    assert_eq!(
        journal.state_sequence(fighter),
        vec![
            CombatState::Idle,
            CombatState::Startup,
            CombatState::Attack,
            CombatState::Recovery,
            CombatState::Idle,
        ]
    );
    assert_eq!(journal.ticks_entering(fighter, CombatState::Startup), vec![0]);
    assert_eq!(journal.ticks_entering(fighter, CombatState::Attack), vec![4]);
    assert_eq!(journal.ticks_entering(fighter, CombatState::Recovery), vec![10]);
    assert_eq!(journal.ticks_entering(fighter, CombatState::Idle), vec![20]);
    assert!(journal.events_at(20).any(|e| e.kind
        == CombatEventKind::SkillFinished {
            skill: jab,
            outcome: HitOutcome::Whiffed
        }));
    assert_eq!(
        arena.bookkeeping(fighter).unwrap().last_outcome,
        HitOutcome::Whiffed
    );
}

#[test]
fn animation_starts_with_startup() {
    init_tracing();
    let library = SkillLibrary::new(vec![skill("jab", Button::Light, 2, 2, 2).build().unwrap()]).unwrap();
    let (presenter, plays) = RecordingPresenter::new();
    let mut arena =
        Arena::with_presenter(CombatConfig::default(), library, Box::new(presenter)).unwrap();
    let fighter = arena.spawn((0.0, 0.0), Facing::Right);
    arena.trigger(fighter, SkillId::new(0)).unwrap();
    assert_eq!(plays.borrow().as_slice(), &[(fighter, "swing".to_owned())]);
}

// ---------------------------------------------------------------------------
// 2. Hit resolution
// ---------------------------------------------------------------------------

#[test]
fn stationary_target_is_hit_once_per_activation() {
    let mut arena = arena_with(vec![skill("beam", Button::Heavy, 1, 20, 1).build().unwrap()]);
    let (attacker, defender) = duel(&mut arena);
    arena.trigger(attacker, id(&arena, "beam")).unwrap();
    arena.run_ticks(25);

    let hits = hits_by(&arena, attacker);
    assert_eq!(hits, vec![(2, defender, HitOutcome::Contact)]);
    assert_eq!(arena.spatial().region_count(), 0);
}

#[test]
fn contact_and_block_apply_equal_hit_stop_on_the_same_tick() {
    let mut arena = arena_with(vec![skill("jab", Button::Light, 4, 6, 10).build().unwrap()]);
    let (attacker, defender) = duel(&mut arena);
    arena.trigger(attacker, id(&arena, "jab")).unwrap();

    arena.run_ticks(4);
    assert_eq!(arena.scalar(attacker, Scalar::HitStop), Some(0));
    arena.step_tick();
    assert_eq!(arena.scalar(attacker, Scalar::HitStop), Some(12));
    assert_eq!(arena.scalar(defender, Scalar::HitStop), Some(12));
    let applied: Vec<CombatantId> = arena
        .journal()
        .events_at(5)
        .filter(|e| e.kind == CombatEventKind::HitStopApplied { ticks: 12 })
        .map(|e| e.combatant)
        .collect();
    assert_eq!(applied, vec![attacker, defender]);

    arena.step_tick();
    assert_eq!(arena.scalar(attacker, Scalar::HitStop), Some(11));
    assert_eq!(arena.scalar(defender, Scalar::HitStop), Some(11));
}

#[test]
fn hit_stop_does_not_delay_the_skill() {
    let mut arena = arena_with(vec![skill("jab", Button::Light, 4, 6, 10).build().unwrap()]);
    let (attacker, _) = duel(&mut arena);
    arena.trigger(attacker, id(&arena, "jab")).unwrap();
    arena.run_ticks(20);
    assert_eq!(arena.state(attacker), Some(CombatState::Idle));
    assert_eq!(
        arena.journal().ticks_entering(attacker, CombatState::Idle),
        vec![20]
    );
    assert_eq!(
        arena.bookkeeping(attacker).unwrap().last_outcome,
        HitOutcome::Contact
    );
}

#[test]
fn contact_stuns_damages_and_credits_the_attacker() {
    let mut arena = arena_with(vec![skill("jab", Button::Light, 4, 6, 10)
        .damage(120)
        .build()
        .unwrap()]);
    let (attacker, defender) = duel(&mut arena);
    arena.trigger(attacker, id(&arena, "jab")).unwrap();
    arena.run_ticks(5);

    assert_eq!(arena.state(defender), Some(CombatState::Hitstun));
    assert_eq!(arena.scalar(defender, Scalar::Health), Some(880));
    assert_eq!(arena.scalar(defender, Scalar::HitStun), Some(8));
    let credit = arena.contributors(defender).unwrap().get(attacker).copied().unwrap();
    assert_eq!(credit.hits, 1);
    assert_eq!(credit.damage, 120);
    assert_eq!(credit.last_tick, 5);

    // Eight stun ticks counted from tick 6.
    arena.run_ticks(7);
    assert_eq!(arena.state(defender), Some(CombatState::Hitstun));
    arena.step_tick();
    assert_eq!(arena.state(defender), Some(CombatState::Idle));
    assert_eq!(arena.scalar(defender, Scalar::HitStun), Some(0));
}

#[test]
fn lethal_damage_knocks_down() {
    let mut arena = arena_with(vec![skill("finisher", Button::Heavy, 4, 6, 10)
        .damage(5000)
        .build()
        .unwrap()]);
    let (attacker, defender) = duel(&mut arena);
    arena.trigger(attacker, id(&arena, "finisher")).unwrap();
    arena.run_ticks(5);
    assert_eq!(arena.scalar(defender, Scalar::Health), Some(0));
    assert_eq!(arena.state(defender), Some(CombatState::Knockdown));
}

#[test]
fn knockdown_flag_knocks_down_airborne_target_into_airborne_knockdown() {
    let mut arena = arena_with(vec![skill("sweep", Button::Heavy, 4, 6, 10)
        .knockdown(true)
        .build()
        .unwrap()]);
    let (attacker, defender) = duel(&mut arena);
    arena
        .machine_mut(defender)
        .unwrap()
        .set_state(CombatState::Midair);
    arena.trigger(attacker, id(&arena, "sweep")).unwrap();
    arena.run_ticks(5);
    assert_eq!(arena.state(defender), Some(CombatState::KnockdownAirborne));
}

#[test]
fn counter_hit_interrupts_the_defenders_startup() {
    let mut arena = arena_with(vec![
        skill("jab", Button::Light, 4, 6, 10)
            .counter_eligible(true)
            .build()
            .unwrap(),
        skill("haymaker", Button::Heavy, 12, 4, 20).build().unwrap(),
    ]);
    let (attacker, defender) = duel(&mut arena);
    let haymaker = id(&arena, "haymaker");
    arena.trigger(defender, haymaker).unwrap();
    arena.trigger(attacker, id(&arena, "jab")).unwrap();
    arena.run_ticks(5);

    assert_eq!(hits_by(&arena, attacker), vec![(5, defender, HitOutcome::Counter)]);
    assert_eq!(arena.state(defender), Some(CombatState::Hitstun));
    assert!(!arena.is_executing(defender));
    assert!(arena
        .journal()
        .events_for(defender)
        .any(|e| e.kind == CombatEventKind::SkillInterrupted { skill: haymaker }));
}

// ---------------------------------------------------------------------------
// 3. Guarding
// ---------------------------------------------------------------------------

#[test]
fn standing_guard_blocks_high() {
    let mut arena = arena_with(vec![skill("jab", Button::Light, 4, 6, 10).build().unwrap()]);
    let (attacker, defender) = duel(&mut arena);
    arena.set_guard(defender, true);
    arena.trigger(attacker, id(&arena, "jab")).unwrap();
    arena.run_ticks(5);

    assert_eq!(hits_by(&arena, attacker), vec![(5, defender, HitOutcome::Blocked)]);
    assert_eq!(arena.state(defender), Some(CombatState::Block));
    assert_eq!(arena.scalar(defender, Scalar::BlockStun), Some(4));
    assert_eq!(arena.scalar(defender, Scalar::Health), Some(1000));
    assert_eq!(arena.scalar(defender, Scalar::HitStop), Some(12));

    arena.run_ticks(3);
    assert_eq!(arena.state(defender), Some(CombatState::Block));
    arena.step_tick();
    assert_eq!(arena.state(defender), Some(CombatState::Idle));
}

#[test]
fn low_always_connects() {
    let mut arena = arena_with(vec![Skill::builder("sweep")
        .frame_data(frame(4, 6, 10, HitRegion::Low))
        .motion([MotionToken::Button(Button::Heavy)])
        .build()
        .unwrap()]);
    let (attacker, defender) = duel(&mut arena);
    arena.set_guard(defender, true);
    arena.input(defender, InputEvent::Direction(Direction::Down));
    assert_eq!(arena.state(defender), Some(CombatState::Crouch));

    arena.trigger(attacker, id(&arena, "sweep")).unwrap();
    arena.run_ticks(5);
    assert_eq!(hits_by(&arena, attacker), vec![(5, defender, HitOutcome::Contact)]);
    assert_eq!(arena.state(defender), Some(CombatState::HitstunCrouching));
}

#[test]
fn overhead_beats_a_crouching_guard_only() {
    let overhead = || {
        Skill::builder("axe")
            .frame_data(frame(4, 6, 10, HitRegion::Overhead))
            .motion([MotionToken::Button(Button::Medium)])
            .build()
            .unwrap()
    };

    let mut crouching = arena_with(vec![overhead()]);
    let (attacker, defender) = duel(&mut crouching);
    crouching.set_guard(defender, true);
    crouching.input(defender, InputEvent::Direction(Direction::Down));
    crouching.trigger(attacker, SkillId::new(0)).unwrap();
    crouching.run_ticks(5);
    assert_eq!(hits_by(&crouching, attacker)[0].2, HitOutcome::Contact);

    let mut standing = arena_with(vec![overhead()]);
    let (attacker, defender) = duel(&mut standing);
    standing.set_guard(defender, true);
    standing.trigger(attacker, SkillId::new(0)).unwrap();
    standing.run_ticks(5);
    assert_eq!(hits_by(&standing, attacker)[0].2, HitOutcome::Blocked);
    assert_eq!(standing.state(defender), Some(CombatState::Block));
}

#[test]
fn crouch_guard_refusal_leaves_state_alone() {
    let mut arena = arena_with(Vec::new());
    let fighter = arena.spawn((0.0, 0.0), Facing::Right);
    let machine = arena.machine_mut(fighter).unwrap();
    machine.set_state_guard(CombatState::Crouch, |_| false);
    assert!(!machine.set_state(CombatState::Crouch));
    assert_eq!(machine.get_state(), CombatState::Idle);

    let outcome = arena.input(fighter, InputEvent::Direction(Direction::Down));
    assert!(matches!(outcome, InputOutcome::Direction { moved: false, .. }));
    assert_eq!(arena.state(fighter), Some(CombatState::Idle));
}

// ---------------------------------------------------------------------------
// 4. Landing cancel
// ---------------------------------------------------------------------------

#[test]
fn landing_cancel_skips_recovery_on_contact() {
    let mut arena = arena_with(vec![skill("dash_punch", Button::Heavy, 4, 6, -4).build().unwrap()]);
    let (attacker, _) = duel(&mut arena);
    arena.trigger(attacker, id(&arena, "dash_punch")).unwrap();
    arena.run_ticks(10);

    assert_eq!(arena.state(attacker), Some(CombatState::Idle));
    assert_eq!(
        arena.journal().state_sequence(attacker),
        vec![
            CombatState::Idle,
            CombatState::Startup,
            CombatState::Attack,
            CombatState::Idle,
        ]
    );
    assert_eq!(
        arena.bookkeeping(attacker).unwrap().last_outcome,
        HitOutcome::Contact
    );
}

#[test]
fn landing_cancel_whiff_still_recovers() {
    let mut arena = arena_with(vec![skill("dash_punch", Button::Heavy, 4, 6, -4).build().unwrap()]);
    let fighter = arena.spawn((0.0, 0.0), Facing::Right);
    arena.trigger(fighter, id(&arena, "dash_punch")).unwrap();
    arena.run_ticks(10);
    assert_eq!(arena.state(fighter), Some(CombatState::Recovery));
    arena.run_ticks(4);
    assert_eq!(arena.state(fighter), Some(CombatState::Idle));
}

// ---------------------------------------------------------------------------
// 5. Trigger rules
// ---------------------------------------------------------------------------

#[test]
fn rejected_trigger_in_recovery_changes_nothing() {
    let mut arena = arena_with(vec![
        skill("jab", Button::Light, 4, 6, 10).gatling("strong").build().unwrap(),
        skill("strong", Button::Medium, 5, 4, 12).build().unwrap(),
    ]);
    let fighter = arena.spawn((0.0, 0.0), Facing::Right);
    arena.trigger(fighter, id(&arena, "jab")).unwrap();
    arena.run_ticks(12);
    assert_eq!(arena.state(fighter), Some(CombatState::Recovery));

    let before = *arena.bookkeeping(fighter).unwrap();
    let hash = arena.state_hash();
    // Whiffed, so even the gatling route is closed.
    let result = arena.trigger(fighter, id(&arena, "strong"));
    assert!(matches!(
        result,
        Err(TriggerRejected::GatlingUnavailable {
            outcome: HitOutcome::Whiffed,
            ..
        })
    ));
    assert_eq!(arena.state(fighter), Some(CombatState::Recovery));
    assert_eq!(*arena.bookkeeping(fighter).unwrap(), before);
    assert_eq!(arena.state_hash(), hash);
}

#[test]
fn gatling_cancels_recovery_after_a_hit() {
    let mut arena = arena_with(vec![
        skill("jab", Button::Light, 4, 6, 10).gatling("strong").build().unwrap(),
        skill("strong", Button::Medium, 5, 4, 12).build().unwrap(),
    ]);
    let (attacker, _) = duel(&mut arena);
    let jab = id(&arena, "jab");
    let strong = id(&arena, "strong");
    let first = arena.trigger(attacker, jab).unwrap();
    arena.run_ticks(11);
    assert_eq!(arena.state(attacker), Some(CombatState::Recovery));

    // Only skills in the gatling set may cancel.
    assert!(matches!(
        arena.trigger(attacker, jab),
        Err(TriggerRejected::GatlingUnavailable { .. })
    ));

    let second = arena.trigger(attacker, strong).unwrap();
    assert!(second > first);
    assert_eq!(arena.state(attacker), Some(CombatState::Startup));
    assert_eq!(arena.current_phase(attacker), Some(Phase::Startup));
    let book = arena.bookkeeping(attacker).unwrap();
    assert_eq!(book.last_skill, Some(strong));
    assert_eq!(book.last_outcome, HitOutcome::Whiffed);
    assert_eq!(book.last_started, Some(second));

    let at_cancel: Vec<CombatEventKind> = arena
        .journal()
        .events_at(11)
        .filter(|e| e.combatant == attacker)
        .map(|e| e.kind.clone())
        .collect();
    assert!(at_cancel.contains(&CombatEventKind::SkillInterrupted { skill: jab }));
    assert!(at_cancel.contains(&CombatEventKind::SkillStarted {
        skill: strong,
        sequence: 2
    }));

    // The cancelled jab never reports a finish.
    arena.run_ticks(30);
    assert!(!arena
        .journal()
        .events_for(attacker)
        .any(|e| e.kind == CombatEventKind::SkillFinished { skill: jab, outcome: HitOutcome::Contact }));
    assert_eq!(arena.state(attacker), Some(CombatState::Idle));
}

#[test]
fn stunned_combatant_cannot_act() {
    let mut arena = arena_with(vec![skill("jab", Button::Light, 4, 6, 10).build().unwrap()]);
    let (attacker, defender) = duel(&mut arena);
    let jab = id(&arena, "jab");
    arena.trigger(attacker, jab).unwrap();
    arena.run_ticks(5);
    assert_eq!(
        arena.trigger(defender, jab),
        Err(TriggerRejected::NegativeState(CombatState::Hitstun))
    );
}

#[test]
fn forced_stun_stops_the_hitbox_before_it_sweeps() {
    let mut arena = arena_with(vec![skill("jab", Button::Light, 1, 10, 4).build().unwrap()]);
    let attacker = arena.spawn((0.0, 0.0), Facing::Right);
    let defender = arena.spawn((50.0, 0.0), Facing::Left);
    let jab = id(&arena, "jab");
    arena.trigger(attacker, jab).unwrap();
    arena.run_ticks(2);
    assert_eq!(arena.state(attacker), Some(CombatState::Attack));
    assert_eq!(arena.spatial().region_count(), 1);

    // Stun the attacker from outside, then walk the defender into reach.
    assert!(arena
        .machine_mut(attacker)
        .unwrap()
        .set_state(CombatState::Hitstun));
    arena.set_position(defender, (1.2, 0.0));
    let tick = arena.step_tick();

    assert!(hits_by(&arena, attacker).is_empty());
    assert_eq!(arena.state(defender), Some(CombatState::Idle));
    assert_eq!(arena.state(attacker), Some(CombatState::Hitstun));
    assert!(!arena.is_executing(attacker));
    assert_eq!(arena.spatial().region_count(), 0);
    assert!(arena
        .journal()
        .events_at(tick)
        .any(|e| e.combatant == attacker
            && e.kind == CombatEventKind::SkillInterrupted { skill: jab }));
}

// ---------------------------------------------------------------------------
// 6. Motion input
// ---------------------------------------------------------------------------

fn motion_library() -> Vec<Skill> {
    vec![
        skill("jab", Button::Light, 4, 6, 10).build().unwrap(),
        Skill::builder("fireball")
            .frame_data(frame(10, 4, 20, HitRegion::High))
            .motion([
                MotionToken::Direction(Direction::Down),
                MotionToken::Direction(Direction::DownRight),
                MotionToken::Direction(Direction::Right),
                MotionToken::Button(Button::Light),
            ])
            .build()
            .unwrap(),
    ]
}

#[test]
fn longest_motion_wins() {
    let mut arena = arena_with(motion_library());
    let fighter = arena.spawn((0.0, 0.0), Facing::Right);
    for d in [Direction::Down, Direction::DownRight, Direction::Right] {
        arena.input(fighter, InputEvent::Direction(d));
    }
    let outcome = arena.input(
        fighter,
        InputEvent::Button {
            button: Button::Light,
            mode: ButtonMode::Press,
        },
    );
    let fireball = id(&arena, "fireball");
    assert!(matches!(outcome, InputOutcome::Triggered { skill, .. } if skill == fireball));
    assert!(arena
        .journal()
        .events_for(fighter)
        .any(|e| e.kind == CombatEventKind::MotionMatched { skill: fireball }));
    assert!(arena.motion_buffer(fighter).unwrap().is_empty());
}

#[test]
fn motion_is_read_relative_to_facing() {
    let mut arena = arena_with(motion_library());
    let fighter = arena.spawn((0.0, 0.0), Facing::Left);
    for d in [Direction::Down, Direction::DownLeft, Direction::Left] {
        arena.input(fighter, InputEvent::Direction(d));
    }
    let outcome = arena.input(
        fighter,
        InputEvent::Button {
            button: Button::Light,
            mode: ButtonMode::Press,
        },
    );
    let fireball = id(&arena, "fireball");
    assert!(matches!(outcome, InputOutcome::Triggered { skill, .. } if skill == fireball));
}

#[test]
fn bare_press_selects_the_short_motion() {
    let mut arena = arena_with(motion_library());
    let fighter = arena.spawn((0.0, 0.0), Facing::Right);
    let outcome = arena.input(
        fighter,
        InputEvent::Button {
            button: Button::Light,
            mode: ButtonMode::Press,
        },
    );
    let jab = id(&arena, "jab");
    assert!(matches!(outcome, InputOutcome::Triggered { skill, .. } if skill == jab));
}

#[test]
fn releases_leave_the_motion_buffer_alone() {
    let mut arena = arena_with(motion_library());
    let fighter = arena.spawn((0.0, 0.0), Facing::Right);
    arena.input(fighter, InputEvent::Direction(Direction::Down));
    let outcome = arena.input(
        fighter,
        InputEvent::Button {
            button: Button::Light,
            mode: ButtonMode::Release,
        },
    );
    assert_eq!(outcome, InputOutcome::Released);
    assert_eq!(
        arena.motion_buffer(fighter).unwrap(),
        &[MotionToken::Direction(Direction::Down)]
    );
    assert_eq!(arena.state(fighter), Some(CombatState::Crouch));
}

#[test]
fn equal_length_matches_are_ambiguous() {
    let mut arena = arena_with(vec![
        skill("left", Button::Unique, 1, 1, 1).build().unwrap(),
        skill("right", Button::Unique, 1, 1, 1).build().unwrap(),
    ]);
    let fighter = arena.spawn((0.0, 0.0), Facing::Right);
    let outcome = arena.input(
        fighter,
        InputEvent::Button {
            button: Button::Unique,
            mode: ButtonMode::Press,
        },
    );
    assert_eq!(
        outcome,
        InputOutcome::Ambiguous(vec![SkillId::new(0), SkillId::new(1)])
    );
    assert_eq!(arena.state(fighter), Some(CombatState::Idle));
}

#[test]
fn busy_press_is_reported_as_rejected() {
    let mut arena = arena_with(motion_library());
    let fighter = arena.spawn((0.0, 0.0), Facing::Right);
    let press = InputEvent::Button {
        button: Button::Light,
        mode: ButtonMode::Press,
    };
    arena.input(fighter, press);
    let outcome = arena.input(fighter, press);
    assert!(matches!(
        outcome,
        InputOutcome::Rejected {
            reason: TriggerRejected::NegativeState(CombatState::Startup),
            ..
        }
    ));
}

#[test]
fn stale_buffer_purge_is_journaled() {
    let mut arena = arena_with(motion_library());
    let fighter = arena.spawn((0.0, 0.0), Facing::Right);
    for d in [Direction::Down, Direction::DownRight, Direction::Right] {
        arena.input(fighter, InputEvent::Direction(d));
    }
    arena.run_ticks(12);
    assert_eq!(arena.motion_buffer(fighter).unwrap().len(), 2);
    assert!(arena
        .journal()
        .events_for(fighter)
        .any(|e| e.kind == CombatEventKind::BufferPurged { dropped: 1 }));
}

// ---------------------------------------------------------------------------
// 7. Clock
// ---------------------------------------------------------------------------

#[test]
fn wall_clock_frames_drive_ticks() {
    let mut arena = arena_with(Vec::new());
    arena.spawn((0.0, 0.0), Facing::Right);
    arena.spawn((3.0, 0.0), Facing::Left);

    // 24 Hz: an interval is just under 0.042 s.
    assert_eq!(arena.advance(0.02), None);
    assert_eq!(arena.advance(0.03), Some(1));
    assert_eq!(arena.last_diagnostics().tick, 1);
    assert_eq!(arena.last_diagnostics().resumed, 2);

    // A long stall fires a single tick.
    assert_eq!(arena.advance(1.0), Some(2));
    assert_eq!(arena.tick(), 2);
}

// ---------------------------------------------------------------------------
// 8. Acknowledgements
// ---------------------------------------------------------------------------

#[test]
fn peer_timeout_is_distinct_from_rejection() {
    let mut arena = arena_with(Vec::new());
    assert_eq!(arena.acks().timeout_ticks(), arena.config().ack_timeout_ticks);

    let confirmed = arena.await_ack("confirm input");
    let refused = arena.await_ack("confirm hit");
    let silent = arena.await_ack("confirm spawn");
    assert_eq!(arena.acks().pending_count(), 3);

    arena.run_ticks(10);
    assert_eq!(arena.resolve_ack(confirmed, AckResponse::Accepted), Ok(()));
    let rejection = arena
        .resolve_ack(refused, AckResponse::Rejected("stale frame".into()))
        .unwrap_err();
    assert!(!rejection.is_retryable());

    arena.run_ticks(37);
    assert!(arena.take_expired_acks().is_empty());
    assert!(arena.acks().is_pending(silent));

    let tick = arena.step_tick();
    assert_eq!(tick, 48);
    let expired = arena.take_expired_acks();
    assert_eq!(expired, vec![AckError::TimedOut { id: silent, waited: 48 }]);
    assert!(expired[0].is_retryable());
    assert!(arena.take_expired_acks().is_empty());
    assert_eq!(
        arena.resolve_ack(silent, AckResponse::Accepted),
        Err(AckError::Unknown(silent))
    );
}

// ---------------------------------------------------------------------------
// 9. Journal bounds
// ---------------------------------------------------------------------------

#[test]
fn bounded_journal_keeps_only_the_newest_events() {
    init_tracing();
    let config = CombatConfig {
        journal_capacity: Some(3),
        ..CombatConfig::default()
    };
    let library = SkillLibrary::new(vec![skill("jab", Button::Light, 4, 6, 10).build().unwrap()]).unwrap();
    let mut arena = Arena::new(config, library).unwrap();
    let fighter = arena.spawn((0.0, 0.0), Facing::Right);
    let jab = id(&arena, "jab");

    arena.trigger(fighter, jab).unwrap();
    arena.run_ticks(20);
    assert_eq!(arena.state(fighter), Some(CombatState::Idle));

    let journal = arena.journal();
    assert_eq!(journal.len(), 3);
    assert!(journal.dropped() > 0);
    assert_eq!(journal.events_at(0).count(), 0);
    assert!(journal.events_at(20).any(|e| e.kind
        == CombatEventKind::SkillFinished {
            skill: jab,
            outcome: HitOutcome::Whiffed
        }));
}
