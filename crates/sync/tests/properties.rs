use std::cell::RefCell;
use std::f32::consts::PI;
use std::rc::Rc;

use proptest::prelude::*;
use seaway::{
    EntityInterpolator, EntityState, InterpolationConfig, MessageRouter, PlayerStatePatch,
    Subscription, wrap_angle,
};
use serde_json::json;

#[derive(Debug, Clone)]
enum Op {
    Subscribe,
    Unsubscribe(usize),
    Dispatch,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Subscribe),
        2 => (0usize..16).prop_map(Op::Unsubscribe),
        2 => Just(Op::Dispatch),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Every dispatch reaches exactly the live subscribers, in the order they
    /// subscribed.
    #[test]
    fn prop_dispatch_reaches_live_subscribers_in_order(ops in prop::collection::vec(arb_op(), 0..40)) {
        let mut router = MessageRouter::new();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut live: Vec<(usize, Subscription)> = Vec::new();
        let mut next_id = 0;

        for op in ops {
            match op {
                Op::Subscribe => {
                    let id = next_id;
                    next_id += 1;
                    let calls = Rc::clone(&calls);
                    let sub = router.subscribe_raw("TICK", move |_| calls.borrow_mut().push(id));
                    live.push((id, sub));
                }
                Op::Unsubscribe(index) => {
                    if !live.is_empty() {
                        let (_, sub) = live.remove(index % live.len());
                        sub.unsubscribe();
                    }
                }
                Op::Dispatch => {
                    calls.borrow_mut().clear();
                    router.dispatch(&json!({"type": "TICK", "payload": null}).to_string());
                    let expected: Vec<usize> = live.iter().map(|(id, _)| *id).collect();
                    prop_assert_eq!(&*calls.borrow(), &expected);
                }
            }
            prop_assert_eq!(router.subscriber_count("TICK"), live.len());
        }
    }

    #[test]
    fn prop_wrap_angle_stays_in_range(angle in -1000.0f32..1000.0) {
        let wrapped = wrap_angle(angle);
        prop_assert!(wrapped > -PI - 1e-4 && wrapped <= PI + 1e-4);
        prop_assert!((wrapped.sin() - angle.sin()).abs() < 1e-2);
        prop_assert!((wrapped.cos() - angle.cos()).abs() < 1e-2);
    }

    /// Each tick moves position closer to the target without passing it.
    #[test]
    fn prop_tick_converges_without_overshoot(
        start in -500.0f32..500.0,
        target in -500.0f32..500.0,
        dts in prop::collection::vec(0.0001f32..=1.0, 1..30),
        time_constant in 0.01f32..2.0,
    ) {
        let mut world = EntityInterpolator::new(InterpolationConfig::uniform(time_constant));
        world.join("ship", Some(EntityState::new(start, 0.0, 0.0)));
        world.apply_update("ship", &PlayerStatePatch { x: Some(target), ..Default::default() });

        let mut gap = (target - start).abs();
        for dt in dts {
            world.tick(dt);
            let x = world.get("ship").unwrap().current.x();
            let new_gap = (target - x).abs();
            prop_assert!(new_gap <= gap + 1e-3);
            prop_assert!((x - start) * (target - start) >= -1e-3);
            prop_assert!((target - x) * (target - start) >= -1e-3);
            gap = new_gap;
        }
    }

    /// Heading never turns more than half a revolution in one tick.
    #[test]
    fn prop_heading_takes_shortest_path(
        from in -PI..PI,
        to in -PI..PI,
        dt in 0.0001f32..=1.0,
    ) {
        let mut world = EntityInterpolator::default();
        world.join("ship", Some(EntityState::new(0.0, 0.0, from)));
        world.apply_update("ship", &PlayerStatePatch { angle: Some(to), ..Default::default() });
        world.tick(dt);

        let heading = world.get("ship").unwrap().current.heading;
        let travelled = wrap_angle(heading - from).abs();
        let shortest = wrap_angle(to - from).abs();
        prop_assert!(travelled <= shortest + 1e-4);
    }
}
