//! End-to-end scheduling scenarios run in the simulator
use tickos_kernel::{utils::PrioBitmap8, CfgBuilder, TaskAttr, TaskId, TaskSt};
use tickos_port_std::{Dispatch, Simulator, StdTraits};

tickos_port_std::use_port!(
    struct Traits16 {
        tick: u16,
        ready_bitmap: PrioBitmap8,
    }
);

fn attr(name: &'static str, priority: usize) -> TaskAttr {
    TaskAttr { name, priority }
}

fn sim(f: impl FnOnce(&mut CfgBuilder<StdTraits>)) -> Simulator<StdTraits> {
    let mut b = CfgBuilder::new();
    f(&mut b);
    Simulator::new(b.finish().unwrap())
}

fn who_ran<Traits>(sim: &Simulator<Traits>) -> Vec<TaskId>
where
    Traits: tickos_kernel::KernelTraits<Port = tickos_port_std::StdPort>,
{
    sim.timeline().iter().map(|&(_, t)| t).collect()
}

#[test]
fn time_slicing() {
    let mut sim = sim(|_| {});
    let a = sim.spawn(attr("a", 2), |_, _| {}).unwrap();
    let b = sim.spawn(attr("b", 2), |_, _| {}).unwrap();
    let c = sim.spawn(attr("c", 2), |_, _| {}).unwrap();
    sim.spawn(attr("low", 1), |_, _| {}).unwrap();
    sim.start().unwrap();

    sim.run_ticks(7).unwrap();
    assert_eq!(who_ran(&sim), [a, b, c, a, b, c, a]);
}

#[test]
fn no_time_slicing() {
    let mut sim = sim(|b| {
        b.time_slicing(false);
    });
    let a = sim.spawn(attr("a", 2), |_, _| {}).unwrap();
    let b = sim.spawn(attr("b", 2), |k, _| k.yield_now().unwrap()).unwrap();
    sim.start().unwrap();

    sim.run_ticks(3).unwrap();
    assert_eq!(who_ran(&sim), [a, a, a]);

    // `a` gives way voluntarily; `b` hands the processor straight back
    sim.kernel_mut().yield_now().unwrap();
    sim.run_ticks(3).unwrap();
    assert_eq!(who_ran(&sim)[3..], [b, a, a]);
}

#[test]
fn preemption_by_wake_up() {
    let mut sim = sim(|_| {});
    let high = sim
        .spawn(attr("high", 3), |k, t| k.request_delay(t, 3).unwrap())
        .unwrap();
    let low = sim.spawn(attr("low", 1), |_, _| {}).unwrap();
    sim.start().unwrap();

    sim.run_ticks(8).unwrap();
    assert_eq!(who_ran(&sim), [high, low, low, high, low, low, high, low]);
    assert_eq!(sim.num_steps_run(TaskId::IDLE), 0);
}

#[test]
fn cooperative() {
    let mut sim = sim(|b| {
        b.preemption(false);
    });
    let high = sim
        .spawn(attr("high", 3), |k, t| k.request_delay(t, 1).unwrap())
        .unwrap();
    let mut steps = 0;
    let low = sim
        .spawn(attr("low", 1), move |k, _| {
            steps += 1;
            if steps % 3 == 0 {
                k.yield_now().unwrap();
            }
        })
        .unwrap();
    sim.start().unwrap();

    // `high` wakes up after a tick, but has to wait until `low` yields
    sim.run_ticks(6).unwrap();
    assert_eq!(who_ran(&sim), [high, low, low, low, high, low]);
    assert_eq!(sim.kernel().task_state(high), Ok(TaskSt::Ready));
}

#[test]
fn periodic_task_across_wrap() {
    let mut b = CfgBuilder::<Traits16>::new();
    b.initial_tick_count(0xfffa);
    let mut sim = Simulator::new(b.finish().unwrap());

    let mut last_wake_time = 0xfffa;
    let periodic = sim
        .spawn(attr("periodic", 2), move |k, _| {
            assert!(k.delay_periodic(&mut last_wake_time, 4).unwrap());
        })
        .unwrap();
    sim.start().unwrap();
    sim.run_ticks(16).unwrap();

    let wake_times: Vec<u16> = sim
        .timeline()
        .iter()
        .filter(|&&(_, t)| t == periodic)
        .map(|&(at, _)| at)
        .collect();
    assert_eq!(wake_times, [0xfffa, 0xfffe, 0x0002, 0x0006]);
}

#[test]
fn suspend_from_another_task() {
    let mut sim = sim(|_| {});
    let worker = sim.spawn(attr("worker", 1), |_, _| {}).unwrap();
    let mut round = 0;
    let controller = sim
        .spawn(attr("controller", 2), move |k, t| {
            round += 1;
            match round {
                1 => k.suspend_task(worker).unwrap(),
                3 => k.resume_task(worker).unwrap(),
                _ => {}
            }
            k.request_delay(t, 2).unwrap();
        })
        .unwrap();
    sim.start().unwrap();

    sim.run_ticks(8).unwrap();
    assert_eq!(
        who_ran(&sim),
        [
            controller,
            TaskId::IDLE,
            controller,
            TaskId::IDLE,
            controller,
            worker,
            controller,
            worker,
        ]
    );
}

#[test]
fn scheduler_suspension_in_a_task() {
    let mut sim = sim(|_| {});
    let high = sim
        .spawn(attr("high", 3), |k, t| k.request_delay(t, 2).unwrap())
        .unwrap();
    let mut step = 0;
    let low = sim
        .spawn(attr("low", 1), move |k, _| {
            step += 1;
            match step {
                1 => k.suspend_all().unwrap(),
                3 => {
                    assert_eq!(k.pended_ticks(), 2);
                    assert!(k.resume_all().unwrap());
                }
                _ => {}
            }
        })
        .unwrap();
    sim.start().unwrap();

    // `high` is due at tick 2, but the scheduler stays suspended until `low`
    // resumes it in its third step
    sim.run_ticks(5).unwrap();
    assert_eq!(who_ran(&sim), [high, low, low, low, high]);
    assert_eq!(sim.kernel().tick_count(), 5);
}

#[test]
fn dispatches_follow_trace() {
    let mut sim = sim(|_| {});
    sim.spawn(attr("a", 1), |k, t| k.request_delay(t, 1).unwrap())
        .unwrap();
    sim.spawn(attr("b", 1), |_, _| {}).unwrap();
    sim.start().unwrap();
    sim.run_ticks(10).unwrap();

    let from_trace: Vec<Dispatch> = sim
        .kernel()
        .trace()
        .records()
        .iter()
        .map(|r| Dispatch {
            prev: r.from,
            next: r.to,
        })
        .collect();
    assert!(!sim.kernel().trace().is_truncated());
    assert_eq!(sim.kernel().port().dispatches(), from_trace);
}
